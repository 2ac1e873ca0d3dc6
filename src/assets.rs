// SPDX-License-Identifier: MPL-2.0

//! Static frontend files served as the window content.
//!
//! The bundle is a plain path → bytes map so the host can be given any set of
//! files; [`AssetBundle::embedded`] is the one compiled into the binary.

use std::borrow::Cow;
use std::collections::HashMap;

const INDEX: &str = "index.html";

#[derive(Debug, Clone)]
pub struct Asset {
    pub data: Cow<'static, [u8]>,
    pub mime: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    files: HashMap<String, Cow<'static, [u8]>>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frontend built into the binary
    pub fn embedded() -> Self {
        Self::new()
            .with_file(
                "index.html",
                include_bytes!("../frontend/dist/index.html").as_slice(),
            )
            .with_file(
                "main.js",
                include_bytes!("../frontend/dist/main.js").as_slice(),
            )
            .with_file(
                "style.css",
                include_bytes!("../frontend/dist/style.css").as_slice(),
            )
    }

    pub fn with_file(mut self, path: &str, data: impl Into<Cow<'static, [u8]>>) -> Self {
        self.files.insert(normalize(path).to_string(), data.into());
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Look up a request path. `/` and directory paths resolve to their index.
    pub fn resolve(&self, path: &str) -> Option<Asset> {
        let path = normalize(path);
        let path = if path.is_empty() || path.ends_with('/') {
            Cow::Owned(format!("{path}{INDEX}"))
        } else {
            Cow::Borrowed(path)
        };

        self.files.get(path.as_ref()).map(|data| Asset {
            data: data.clone(),
            mime: mime_for(&path),
        })
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_start_matches('/')
}

fn mime_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "js" | "mjs" => "text/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
