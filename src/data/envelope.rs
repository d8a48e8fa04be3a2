//! Response envelope for simple lookup endpoints

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fetch::{CachedPayload, FetchFailure};

/// `{ success, data?, error?, message? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// A successful response carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// A well-formed response with zeroed `data`, used when no real data could be served
    pub fn degraded(data: T, failure: &FetchFailure) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(failure.code().as_str().to_string()),
            message: Some(failure.message.clone()),
        }
    }

    /// A failure with no data at all
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

impl<T> CachedPayload for Envelope<T> where T: Serialize + DeserializeOwned + Send {}
