//! A single network attempt: build the reqwest request, send it, and turn
//! the reply into an [`ApiResponse`] or an [`ApiError`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use crate::types::{
    ApiResponse, FormPart, RequestBody, RequestConfig, ResponseBody, ResponseMetadata,
};
use crate::{ApiError, HermodError, Result};

/// Send `request` once.
///
/// `fallback_timeout` applies when the request carries no timeout of its
/// own. Non-2xx replies become [`HermodError::Api`] errors carrying the
/// parsed error body.
pub(crate) async fn send(
    http: &Client,
    request: &RequestConfig,
    fallback_timeout: Duration,
) -> Result<ApiResponse> {
    let attempt_start = Instant::now();
    let multipart = request.is_multipart();

    let mut builder = http
        .request(request.method.clone(), &request.url)
        .timeout(request.timeout.unwrap_or(fallback_timeout));

    for (name, value) in &request.headers {
        // The multipart encoder sets its own boundary-bearing content type.
        if multipart && name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        builder = builder.header(name, value);
    }
    if let Some(params) = &request.params {
        builder = builder.query(params);
    }
    builder = match &request.data {
        Some(RequestBody::Json(value)) => builder.json(value),
        Some(RequestBody::Text(text)) => builder.body(text.clone()),
        Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
        Some(RequestBody::Multipart(parts)) => builder.multipart(build_form(parts)?),
        None => builder,
    };

    let response = builder.send().await?;
    let status = response.status();
    let headers = collect_headers(response.headers());
    let bytes = response.bytes().await?;

    let content_type = headers.get("content-type").map(String::as_str).unwrap_or("");
    let response_time = request
        .metadata
        .start_time
        .unwrap_or(attempt_start)
        .elapsed();

    if !status.is_success() {
        let body = parse_error_body(content_type, &bytes);
        let message = body
            .error_message()
            .unwrap_or_else(|| default_message(status));
        let retry_after = headers.get("retry-after").and_then(|v| parse_retry_after(v));
        return Err(ApiError::new(HermodError::Api {
            status: status.as_u16(),
            message,
            body,
            retry_after,
        }));
    }

    let data = parse_body(content_type, &bytes)?;
    Ok(ApiResponse {
        data,
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        config: request.clone(),
        metadata: ResponseMetadata {
            response_time,
            request_id: request.metadata.request_id.clone(),
            from_cache: false,
        },
    })
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                content,
                mime,
            } => {
                let mut file = Part::bytes(content.clone()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime).map_err(|e| {
                        HermodError::InvalidInput(format!("invalid mime type {mime:?}: {e}"))
                    })?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Header names are lowercase; values that are not visible ASCII are dropped.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn is_json(content_type: &str) -> bool {
    content_type.contains("application/json") || content_type.contains("+json")
}

/// Parse a successful body by content type.
fn parse_body(content_type: &str, bytes: &[u8]) -> Result<ResponseBody> {
    if bytes.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    if is_json(content_type) {
        return Ok(ResponseBody::Json(serde_json::from_slice(bytes)?));
    }
    if content_type.starts_with("text/") {
        return Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()));
    }
    Ok(ResponseBody::Binary(bytes.to_vec()))
}

/// Parse an error body; malformed JSON degrades to text instead of failing.
fn parse_error_body(content_type: &str, bytes: &[u8]) -> ResponseBody {
    if bytes.is_empty() {
        return ResponseBody::Empty;
    }
    if is_json(content_type) {
        return serde_json::from_slice(bytes)
            .map(ResponseBody::Json)
            .unwrap_or_else(|_| ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()));
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => ResponseBody::Text(text.to_string()),
        Err(_) => ResponseBody::Binary(bytes.to_vec()),
    }
}

fn default_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
