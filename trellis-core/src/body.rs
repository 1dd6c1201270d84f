// Request body collection and parsing

use crate::logging::trace;
use crate::{Error, HttpRequest};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};

/// Default body limit: 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Collect a body, failing with [`Error::PayloadTooLarge`] past `limit` bytes.
pub async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, Error>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            Error::PayloadTooLarge(format!("body exceeds {} bytes", limit))
        } else {
            Error::Internal(format!("Failed to collect body: {}", e))
        }
    })?;
    Ok(collected.to_bytes())
}

/// Decodes the raw request body into [`HttpRequest::parsed_body`] by
/// content type:
///
/// - `application/json` and `*+json`: JSON, `400` on malformed input
/// - `application/x-www-form-urlencoded`: an object of strings
/// - `text/*`: a string
///
/// Other content types and empty bodies are left unparsed.
#[derive(Debug, Clone, Copy)]
pub struct BodyParser {
    limit: usize,
}

impl Default for BodyParser {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl BodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn parse(&self, request: &mut HttpRequest) -> Result<(), Error> {
        if request.body.len() > self.limit {
            return Err(Error::PayloadTooLarge(format!(
                "body of {} bytes exceeds {} bytes",
                request.body.len(),
                self.limit
            )));
        }
        if request.body.is_empty() {
            return Ok(());
        }

        let content_type = request
            .header("content-type")
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .unwrap_or_default();

        let parsed = if content_type == "application/json" || content_type.ends_with("+json") {
            let value: Value = serde_json::from_slice(&request.body)
                .map_err(|e| Error::BadRequest(format!("Invalid JSON body: {}", e)))?;
            Some(value)
        } else if content_type == "application/x-www-form-urlencoded" {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&request.body)
                .map_err(|e| Error::BadRequest(format!("Invalid form body: {}", e)))?;
            Some(Value::Object(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect::<Map<_, _>>(),
            ))
        } else if content_type.starts_with("text/") {
            Some(Value::String(
                String::from_utf8_lossy(&request.body).into_owned(),
            ))
        } else {
            None
        };

        trace!(
            content_type = %content_type,
            parsed = parsed.is_some(),
            bytes = request.body.len(),
            "Parsed request body"
        );
        request.parsed_body = parsed;
        Ok(())
    }
}
