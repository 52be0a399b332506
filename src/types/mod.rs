//! Public types for the Hermod API.

mod request;
mod response;

use std::time::{SystemTime, UNIX_EPOCH};

pub use request::{FormPart, RequestBody, RequestConfig, RequestMetadata};
pub use response::{ApiResponse, ResponseBody, ResponseMetadata};

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
