//! Server-sent DOM patches and client signals.
//!
//! Handlers render HTML fragments and describe how the client should graft
//! them into the page: replace an element, append to a list, remove a node,
//! or merge signal values. The wire format is plain SSE as produced by
//! axum's `sse` module; each [`Patch`] becomes one event the client-side
//! runtime applies by CSS selector.
//!
//! ```rust,ignore
//! PatchStream::new()
//!     .patch(Patch::elements(item_html).selector("#post-list").mode(PatchMode::Prepend))
//!     .patch(Patch::signals(&json!({ "content": "" })))
//! ```

use crate::error::Error;
use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request};
use axum::http::Method;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;

/// How a patched fragment is grafted into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchMode {
    /// Morph the whole matched element (the protocol default).
    #[default]
    Outer,
    /// Morph only the matched element's children.
    Inner,
    /// Replace the matched element outright.
    Replace,
    Append,
    Prepend,
    /// Remove the matched element; carries no markup.
    Remove,
}

impl PatchMode {
    fn as_str(self) -> &'static str {
        match self {
            PatchMode::Outer => "outer",
            PatchMode::Inner => "inner",
            PatchMode::Replace => "replace",
            PatchMode::Append => "append",
            PatchMode::Prepend => "prepend",
            PatchMode::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone)]
enum PatchKind {
    Elements(String),
    Signals(String),
}

/// One DOM or signal patch, serialized as a single SSE event.
#[derive(Debug, Clone)]
pub struct Patch {
    kind: PatchKind,
    selector: Option<String>,
    mode: PatchMode,
}

impl Patch {
    /// Patch the elements identified by the fragment's own ids (or by an
    /// explicit [`selector`](Self::selector)).
    pub fn elements(html: impl Into<String>) -> Self {
        Self { kind: PatchKind::Elements(html.into()), selector: None, mode: PatchMode::Outer }
    }

    /// Remove the element matching `selector`.
    pub fn remove(selector: impl Into<String>) -> Self {
        Self {
            kind: PatchKind::Elements(String::new()),
            selector: Some(selector.into()),
            mode: PatchMode::Remove,
        }
    }

    /// Merge values into the client's signals.
    pub fn signals(signals: &Value) -> Self {
        Self { kind: PatchKind::Signals(signals.to_string()), selector: None, mode: PatchMode::Outer }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn mode(mut self, mode: PatchMode) -> Self {
        self.mode = mode;
        self
    }

    fn event_type(&self) -> &'static str {
        match self.kind {
            PatchKind::Elements(_) => "datastar-patch-elements",
            PatchKind::Signals(_) => "datastar-patch-signals",
        }
    }

    /// The event data block, one directive per line.
    fn data(&self) -> String {
        let mut lines = Vec::new();
        match &self.kind {
            PatchKind::Elements(html) => {
                if let Some(selector) = &self.selector {
                    lines.push(format!("selector {selector}"));
                }
                if self.mode != PatchMode::Outer {
                    lines.push(format!("mode {}", self.mode.as_str()));
                }
                for line in html.lines() {
                    lines.push(format!("elements {line}"));
                }
            }
            PatchKind::Signals(signals) => {
                for line in signals.lines() {
                    lines.push(format!("signals {line}"));
                }
            }
        }
        lines.join("\n")
    }

    pub fn into_event(self) -> Event {
        Event::default().event(self.event_type()).data(self.data())
    }
}

/// An ordered batch of patches, sent as one short-lived SSE response that
/// closes after the last event.
#[derive(Debug, Default)]
pub struct PatchStream {
    patches: Vec<Patch>,
}

impl PatchStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }
}

impl IntoResponse for PatchStream {
    fn into_response(self) -> Response {
        let events =
            self.patches.into_iter().map(|p| Ok::<_, Infallible>(p.into_event()));
        Sse::new(futures::stream::iter(events)).into_response()
    }
}

/// Client signals submitted with a request: the JSON body for non-GET
/// requests, the `datastar` query parameter for GET. Missing input parses
/// as an empty object so optional signal structs work.
pub struct Signals<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Signals<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET {
            let raw = Query::<HashMap<String, String>>::try_from_uri(req.uri())
                .map_err(|e| Error::BadRequest(format!("Invalid query string: {e}")))?
                .0
                .remove("datastar")
                .unwrap_or_else(|| "{}".to_string());
            Ok(Signals(serde_json::from_str(&raw)?))
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| Error::BadRequest(format!("Unreadable body: {e}")))?;
            let slice: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
            Ok(Signals(serde_json::from_slice(slice)?))
        }
    }
}

/// Escape text for interpolation into an HTML fragment.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
