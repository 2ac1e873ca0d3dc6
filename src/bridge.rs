// SPDX-License-Identifier: MPL-2.0

//! Frontend-to-backend call bridge.
//!
//! The frontend posts JSON requests of the form
//! `{"id": 1, "object": "app", "method": "history_count", "args": {...}}`
//! through the `shion` script message handler. Each request is dispatched to
//! the bound object with that name and answered with a script that settles
//! the matching promise on the page.

use crate::store::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Name of the script message handler registered on the web view
pub const BRIDGE_HANDLER: &str = "shion";

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("unknown object: {0}")]
    UnknownObject(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(#[from] serde_json::Error),
    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0} panicked")]
    Panicked(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An object whose methods are callable from frontend script
pub trait Bound: Send + Sync {
    /// Name the frontend addresses this object by
    fn name(&self) -> &str;

    /// Methods exposed to the frontend
    fn methods(&self) -> &[&'static str];

    fn invoke(&self, method: &str, args: Value) -> Result<Value, InvokeError>;
}

/// Decode call arguments. A missing argument decodes like an empty object so
/// methods whose options are all optional can be called bare.
pub fn decode_args<T: DeserializeOwned>(args: Value) -> Result<T, InvokeError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    Ok(serde_json::from_value(args)?)
}

/// Encode a method result for the page
pub fn encode<T: Serialize>(value: T) -> Result<Value, InvokeError> {
    serde_json::to_value(value).map_err(InvokeError::Encode)
}

#[derive(Debug, Deserialize)]
struct Request {
    id: u64,
    object: String,
    method: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub id: u64,
    pub outcome: Result<Value, String>,
}

impl Reply {
    /// Script that settles the pending promise for this call
    pub fn to_script(&self) -> String {
        let (ok, payload) = match &self.outcome {
            Ok(value) => (true, value.to_string()),
            Err(message) => (false, Value::String(message.clone()).to_string()),
        };
        format!("window.shion.settle({}, {ok}, {payload});", self.id)
    }
}

/// Script that delivers a host event to listeners on the page
pub fn event_script(event: &str, payload: &Value) -> String {
    format!(
        "window.shion.events.dispatch({}, {payload});",
        Value::String(event.to_string())
    )
}

/// Registry of bound objects
#[derive(Clone, Default)]
pub struct Bridge {
    objects: BTreeMap<String, Arc<dyn Bound>>,
}

impl Bridge {
    pub fn new(bound: Vec<Arc<dyn Bound>>) -> Self {
        let objects = bound
            .into_iter()
            .map(|object| (object.name().to_string(), object))
            .collect();
        Self { objects }
    }

    /// Handle one raw message from the page. Returns `None` when the message
    /// is too malformed to carry a call id, since there is nothing to answer.
    pub fn handle(&self, raw: &str) -> Option<Reply> {
        let request: Request = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                let id = serde_json::from_str::<Value>(raw)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_u64));
                tracing::warn!(error = %e, "malformed bridge request");
                return id.map(|id| Reply {
                    id,
                    outcome: Err(format!("malformed request: {e}")),
                });
            }
        };

        let outcome = self
            .call(&request.object, &request.method, request.args)
            .map_err(|e| {
                tracing::warn!(
                    object = %request.object,
                    method = %request.method,
                    error = %e,
                    "bridge call failed"
                );
                e.to_string()
            });

        Some(Reply {
            id: request.id,
            outcome,
        })
    }

    pub fn call(&self, object: &str, method: &str, args: Value) -> Result<Value, InvokeError> {
        let target = self
            .objects
            .get(object)
            .ok_or_else(|| InvokeError::UnknownObject(object.to_string()))?;
        if !target.methods().iter().any(|m| *m == method) {
            return Err(InvokeError::UnknownMethod(method.to_string()));
        }
        tracing::trace!(object, method, "bridge call");

        // A panicking method still answers, so the page promise settles
        panic::catch_unwind(AssertUnwindSafe(|| target.invoke(method, args))).unwrap_or_else(|_| {
            tracing::error!(object, method, "bridge method panicked");
            Err(InvokeError::Panicked(format!("{object}.{method}")))
        })
    }

    /// Page script defining `window.shion` plus one stub per bound method,
    /// e.g. `window.shion.app.history_count({...})`
    pub fn runtime_script(&self) -> String {
        let mut script = String::from(RUNTIME_JS);
        for (name, object) in &self.objects {
            let name_json = Value::String(name.clone());
            script.push_str(&format!("window.shion[{name_json}] = {{\n"));
            for method in object.methods() {
                let method_json = Value::String(method.to_string());
                script.push_str(&format!(
                    "  [{method_json}]: (args) => window.shion.invoke({name_json}, {method_json}, args),\n"
                ));
            }
            script.push_str("};\n");
        }
        script
    }
}

const RUNTIME_JS: &str = r#"(function () {
  if (window.shion) return;
  const pending = new Map();
  const listeners = new Map();
  let nextId = 1;

  function invoke(object, method, args) {
    const id = nextId++;
    return new Promise((resolve, reject) => {
      pending.set(id, { resolve, reject });
      const request = { id, object, method, args: args === undefined ? null : args };
      window.webkit.messageHandlers.shion.postMessage(JSON.stringify(request));
    });
  }

  function settle(id, ok, payload) {
    const call = pending.get(id);
    if (!call) return;
    pending.delete(id);
    if (ok) {
      call.resolve(payload);
    } else {
      call.reject(new Error(payload));
    }
  }

  const events = {
    on(name, fn) {
      if (!listeners.has(name)) listeners.set(name, new Set());
      listeners.get(name).add(fn);
      return () => listeners.get(name).delete(fn);
    },
    dispatch(name, payload) {
      for (const fn of listeners.get(name) || []) {
        try {
          fn(payload);
        } catch (error) {
          console.error(error);
        }
      }
    },
  };

  window.shion = { invoke, settle, events };
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl Bound for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn methods(&self) -> &[&'static str] {
            &["echo", "fail", "boom"]
        }

        fn invoke(&self, method: &str, args: Value) -> Result<Value, InvokeError> {
            match method {
                "echo" => Ok(args),
                "fail" => Err(InvokeError::Store(StoreError::NotFound)),
                "boom" => panic!("method blew up"),
                other => Err(InvokeError::UnknownMethod(other.to_string())),
            }
        }
    }

    fn bridge() -> Bridge {
        Bridge::new(vec![Arc::new(Echo) as Arc<dyn Bound>])
    }

    #[test]
    fn test_dispatch_to_bound_method() {
        let reply = bridge()
            .handle(r#"{"id": 7, "object": "echo", "method": "echo", "args": {"a": 1}}"#)
            .unwrap();
        assert_eq!(reply.id, 7);
        assert_eq!(reply.outcome, Ok(json!({"a": 1})));
    }

    #[test]
    fn test_missing_args_are_null() {
        let reply = bridge()
            .handle(r#"{"id": 1, "object": "echo", "method": "echo"}"#)
            .unwrap();
        assert_eq!(reply.outcome, Ok(Value::Null));
    }

    #[test]
    fn test_unknown_targets_are_errors() {
        let bridge = bridge();

        let reply = bridge
            .handle(r#"{"id": 2, "object": "nope", "method": "echo"}"#)
            .unwrap();
        assert_eq!(reply.outcome, Err("unknown object: nope".to_string()));

        let reply = bridge
            .handle(r#"{"id": 3, "object": "echo", "method": "shout"}"#)
            .unwrap();
        assert_eq!(reply.outcome, Err("unknown method: shout".to_string()));

        let reply = bridge
            .handle(r#"{"id": 4, "object": "echo", "method": "fail"}"#)
            .unwrap();
        assert_eq!(reply.outcome, Err("not found".to_string()));
    }

    #[test]
    fn test_malformed_requests() {
        let bridge = bridge();
        assert!(bridge.handle("not json").is_none());
        assert!(bridge.handle(r#"{"object": "echo"}"#).is_none());

        let reply = bridge.handle(r#"{"id": 9, "method": 5}"#).unwrap();
        assert_eq!(reply.id, 9);
        assert!(reply.outcome.unwrap_err().starts_with("malformed request"));
    }

    #[test]
    fn test_panicking_method_still_replies() {
        let reply = bridge()
            .handle(r#"{"id": 11, "object": "echo", "method": "boom"}"#)
            .unwrap();
        assert_eq!(reply.id, 11);
        assert_eq!(reply.outcome, Err("echo.boom panicked".to_string()));
    }

    #[test]
    fn test_encode_failure_is_not_blamed_on_args() {
        // JSON object keys must be strings
        let map: BTreeMap<Vec<u8>, i32> = BTreeMap::from([(vec![1], 1)]);
        assert!(matches!(encode(map), Err(InvokeError::Encode(_))));
        assert_eq!(encode([1, 2]).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_reply_scripts() {
        let ok = Reply {
            id: 5,
            outcome: Ok(json!({"n": 2})),
        };
        assert_eq!(ok.to_script(), r#"window.shion.settle(5, true, {"n":2});"#);

        let err = Reply {
            id: 6,
            outcome: Err("bad \"quote\"".to_string()),
        };
        assert_eq!(
            err.to_script(),
            r#"window.shion.settle(6, false, "bad \"quote\"");"#
        );
    }

    #[test]
    fn test_event_script() {
        assert_eq!(
            event_script("history-updated", &json!(3)),
            r#"window.shion.events.dispatch("history-updated", 3);"#
        );
    }

    #[test]
    fn test_runtime_script_has_stubs() {
        let script = bridge().runtime_script();
        assert!(script.contains("window.shion = { invoke, settle, events };"));
        assert!(script.contains(r#"window.shion["echo"] = {"#));
        assert!(script.contains(r#"["fail"]: (args) => window.shion.invoke("echo", "fail", args),"#));
    }

    #[test]
    fn test_decode_args_treats_null_as_empty() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Opts {
            keyword: Option<String>,
        }

        let opts: Opts = decode_args(Value::Null).unwrap();
        assert!(opts.keyword.is_none());

        let err = decode_args::<Opts>(json!({"keyword": 3})).err().unwrap();
        assert!(matches!(err, InvokeError::InvalidArgs(_)));
    }
}
