//! Synthesized responses for when neither network nor cache can answer.

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use stacks_core::ResponseSnapshot;

use crate::route::Fallback;

const OFFLINE_MESSAGE: &str = "Connect to the internet to sync the latest content";

const OFFLINE_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Library - Offline</title>
  <style>body { font-family: sans-serif; text-align: center; padding: 50px; }</style>
</head>
<body>
  <h1>You're offline</h1>
  <p>Books you have already opened are still available.</p>
  <button onclick="location.reload()">Try again</button>
</body>
</html>
"#;

fn headers(content_type: &'static str) -> HeaderMap {
    HeaderMap::from_iter([
        (CONTENT_TYPE, HeaderValue::from_static(content_type)),
        (CACHE_CONTROL, HeaderValue::from_static("no-store")),
    ])
}

pub fn plain_text(status: u16, message: &str) -> ResponseSnapshot {
    ResponseSnapshot::now(status, headers("text/plain; charset=utf-8"), message.as_bytes())
}

/// 503 with the structured offline body API callers parse.
pub fn offline_json(message: &str) -> ResponseSnapshot {
    let body = serde_json::json!({ "error": "offline", "message": message });
    ResponseSnapshot::now(503, headers("application/json"), body.to_string())
}

/// Always renderable, hence 200.
pub fn offline_document() -> ResponseSnapshot {
    ResponseSnapshot::now(200, headers("text/html; charset=utf-8"), OFFLINE_DOCUMENT)
}

/// Build the response a route's fallback describes.
pub fn synthesize(fallback: &Fallback) -> ResponseSnapshot {
    match fallback {
        Fallback::Text { status, message } => plain_text(*status, message),
        Fallback::OfflineJson => offline_json(OFFLINE_MESSAGE),
        Fallback::OfflineDocument => offline_document(),
    }
}
