// SPDX-License-Identifier: MPL-2.0

use crate::bridge::{Bound, InvokeError, decode_args, encode};
use crate::config::APP_NAME;
use crate::host::HostContext;
use crate::store::{
    Database, DomainStore, DomainUpdate, HistoryFilter, HistoryStore, NewDomain, NewHistory,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Methods the frontend can call on the application object
const METHODS: &[&str] = &[
    "app_info",
    "domain_select",
    "domain_insert",
    "domain_update",
    "domain_remove",
    "history_batch_insert",
    "history_select",
    "history_count",
    "history_pagination_select",
    "history_remove",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub config_dir: String,
    pub database_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DomainQuery {
    id: Option<i64>,
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ById {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeywordQuery {
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    keyword: Option<String>,
    page: i64,
    size: i64,
}

/// The application object bound to the frontend.
///
/// Calls arrive from worker threads; every method goes through the shared
/// [`Database`] handle, which serializes access to the connection.
pub struct ShionApp {
    db: Database,
    config_dir: PathBuf,
    context: OnceLock<HostContext>,
}

impl ShionApp {
    pub fn new(db: Database, config_dir: PathBuf) -> Self {
        Self {
            db,
            config_dir,
            context: OnceLock::new(),
        }
    }

    /// Lifecycle hook, run once the window is up
    pub fn startup(&self, context: HostContext) {
        if self.context.set(context).is_err() {
            tracing::warn!("startup called more than once");
            return;
        }
        tracing::info!(database = %self.db.path().display(), "application started");
        self.emit("app-ready", &self.info());
    }

    pub fn info(&self) -> AppInfo {
        AppInfo {
            name: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_dir: self.config_dir.display().to_string(),
            database_path: self.db.path().display().to_string(),
        }
    }

    /// Best effort: events are only deliverable while the window is open
    fn emit<T: Serialize>(&self, event: &str, payload: &T) {
        let Some(context) = self.context.get() else {
            return;
        };
        if let Err(e) = context.emit(event, payload) {
            tracing::debug!(event, error = %e, "event not delivered");
        }
    }

    fn domains(&self) -> DomainStore<'_> {
        DomainStore::new(&self.db)
    }

    fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(&self.db)
    }
}

impl Bound for ShionApp {
    fn name(&self) -> &str {
        "app"
    }

    fn methods(&self) -> &[&'static str] {
        METHODS
    }

    fn invoke(&self, method: &str, args: Value) -> Result<Value, InvokeError> {
        let result = match method {
            "app_info" => encode(self.info())?,
            "domain_select" => {
                let query: DomainQuery = decode_args(args)?;
                let domains = self.domains().select(query.id, query.pattern.as_deref())?;
                encode(domains)?
            }
            "domain_insert" => {
                let domain: NewDomain = decode_args(args)?;
                let domain = self.domains().insert(&domain)?;
                self.emit("domain-updated", &domain.id);
                encode(domain)?
            }
            "domain_update" => {
                let update: DomainUpdate = decode_args(args)?;
                let domain = self.domains().update(&update)?;
                self.emit("domain-updated", &domain.id);
                encode(domain)?
            }
            "domain_remove" => {
                let ById { id } = decode_args(args)?;
                self.domains().remove(id)?;
                self.emit("domain-updated", &id);
                Value::Null
            }
            "history_batch_insert" => {
                let entries: Vec<NewHistory> = serde_json::from_value(args)?;
                let inserted = self.history().batch_insert(&entries)?;
                if inserted > 0 {
                    self.emit("history-updated", &inserted);
                }
                json!(inserted)
            }
            "history_select" => {
                let filter: HistoryFilter = decode_args(args)?;
                encode(self.history().select(&filter)?)?
            }
            "history_count" => {
                let query: KeywordQuery = decode_args(args)?;
                let count = self.history().count(query.keyword.as_deref())?;
                json!(count)
            }
            "history_pagination_select" => {
                let query: PageQuery = decode_args(args)?;
                let page = self
                    .history()
                    .pagination_select(query.keyword, query.page, query.size)?;
                encode(page)?
            }
            "history_remove" => {
                let ById { id } = decode_args(args)?;
                self.history().remove(id)?;
                self.emit("history-updated", &0);
                Value::Null
            }
            other => return Err(InvokeError::UnknownMethod(other.to_string())),
        };
        Ok(result)
    }
}
