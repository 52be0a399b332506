//! Response types

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::request::RequestConfig;
use crate::Result;

/// Parsed response payload, chosen by the response `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
    Empty,
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// Best-effort human-readable message for an error body.
    ///
    /// JSON bodies contribute their `message` (or `error`) field; text
    /// bodies are used verbatim.
    pub(crate) fn error_message(&self) -> Option<String> {
        match self {
            ResponseBody::Json(v) => ["message", "error"]
                .iter()
                .find_map(|k| v.get(k).and_then(|m| m.as_str()))
                .map(str::to_owned),
            ResponseBody::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// A completed response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: ResponseBody,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// The request as it was sent, after transformers and interceptors.
    pub config: RequestConfig,
    pub metadata: ResponseMetadata,
}

/// Timing and provenance of a response.
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub response_time: Duration,
    pub request_id: Option<String>,
    /// Set when the response was served from the client cache.
    pub from_cache: bool,
}

impl ApiResponse {
    /// Deserialize a JSON payload into `T`.
    ///
    /// Text payloads are parsed as JSON too; other payloads are an error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            ResponseBody::Json(v) => Ok(T::deserialize(v)?),
            ResponseBody::Text(s) => Ok(serde_json::from_str(s)?),
            ResponseBody::Binary(b) => Ok(serde_json::from_slice(b)?),
            ResponseBody::Empty => Ok(serde_json::from_str("null")?),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
