//! Request description types

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde::Serialize;

/// Everything needed to issue one request.
///
/// Interceptors and transformers receive a `RequestConfig` by value and
/// hand back the (possibly modified) config to the next stage.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Query parameters; kept sorted so cache keys are stable.
    pub params: Option<BTreeMap<String, String>>,
    pub data: Option<RequestBody>,
    /// Per-request timeout. Falls back to the client timeout when unset.
    pub timeout: Option<Duration>,
    /// Per-request cache override. Falls back to the client setting.
    pub cache: Option<bool>,
    pub metadata: RequestMetadata,
}

/// Bookkeeping attached by the request metadata interceptor.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub start_time: Option<Instant>,
    pub request_id: Option<String>,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
    /// Sent as `multipart/form-data`, never JSON-encoded.
    Multipart(Vec<FormPart>),
}

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Vec<u8>,
        mime: Option<String>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            content: content.into(),
            mime: None,
        }
    }
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            params: None,
            data: None,
            timeout: None,
            cache: None,
            metadata: RequestMetadata::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Set a header, replacing any existing header of the same name
    /// regardless of case.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = self.params.get_or_insert_with(BTreeMap::new);
        for (k, v) in params {
            map.insert(k.into(), v.into());
        }
        self
    }

    /// Attach a JSON body from any serializable value.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> crate::Result<Self> {
        self.data = Some(RequestBody::Json(serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.data = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Force caching on or off for this request.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Whether the request carries a multipart body.
    pub fn is_multipart(&self) -> bool {
        matches!(self.data, Some(RequestBody::Multipart(_)))
    }
}

impl From<&str> for RequestConfig {
    fn from(url: &str) -> Self {
        RequestConfig::get(url)
    }
}

impl From<String> for RequestConfig {
    fn from(url: String) -> Self {
        RequestConfig::get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_shorthand_is_get() {
        let config = RequestConfig::from("/users");
        assert_eq!(config.method, Method::GET);
        assert_eq!(config.url, "/users");
        assert!(config.data.is_none());
    }

    #[test]
    fn params_stay_sorted() {
        let config = RequestConfig::get("/users")
            .param("page", "2")
            .params([("active", "true"), ("sort", "name")]);
        let keys: Vec<_> = config.params.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["active", "page", "sort"]);
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let config = RequestConfig::get("/users")
            .header("authorization", "Bearer old")
            .header("Authorization", "Bearer new");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["Authorization"], "Bearer new");
    }

    #[test]
    fn json_body_serializes_value() {
        #[derive(Serialize)]
        struct NewUser<'a> {
            name: &'a str,
        }

        let config = RequestConfig::post("/users")
            .json(&NewUser { name: "A" })
            .unwrap();
        assert_eq!(
            config.data,
            Some(RequestBody::Json(serde_json::json!({"name": "A"})))
        );
        assert!(!config.is_multipart());
    }
}
