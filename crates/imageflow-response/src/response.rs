//! Owned response snapshot and the JSON envelope it carries
//!
//! The native side packs all structured content into the single data
//! string. Parsing happens here, after the text has been copied out of
//! native memory.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ViewError};

/// Response extracted from a bound view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    /// Data text. `None` when the call failed or the pointer was NULL.
    pub data: Option<String>,
}

impl Response {
    /// Convert to a `Result`, mapping a failed call to `NativeFailure`.
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(ViewError::NativeFailure { message: self.data })
        }
    }

    fn text(&self) -> Result<&str> {
        if !self.success {
            return Err(ViewError::NativeFailure {
                message: self.data.clone(),
            });
        }
        Ok(self.data.as_deref().unwrap_or_default())
    }

    /// Deserialize the data text as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(self.text()?)?)
    }

    /// Parse the data text as an imageflow JSON envelope.
    pub fn envelope(&self) -> Result<JsonEnvelope> {
        self.json()
    }
}

/// JSON envelope returned by imageflow
///
/// ```json
/// {"code": 200, "success": true, "message": "OK", "data": {"job_result": {}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub code: i64,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl JsonEnvelope {
    pub fn is_ok(&self) -> bool {
        self.success && (200..300).contains(&self.code)
    }

    /// Deserialize the envelope's `data` member.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.data)?)
    }
}
