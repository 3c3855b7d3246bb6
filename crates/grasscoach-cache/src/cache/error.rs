use thiserror::Error;

use crate::fetch::FetchError;
use crate::models::{Asset, RequestIdentity};
use crate::store::StoreError;

/// Maximum length for response body excerpts in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Why a Populate did not complete. The epoch's store is left unsealed.
#[derive(Error, Debug)]
pub enum PopulateError {
    #[error("Failed to fetch seed asset {identity}: {source}")]
    Fetch {
        identity: RequestIdentity,
        #[source]
        source: FetchError,
    },

    #[error("Seed asset {identity} returned status {status}: {excerpt}")]
    Status {
        identity: RequestIdentity,
        status: u16,
        excerpt: String,
    },

    #[error("Store error during populate: {0}")]
    Store(#[from] StoreError),
}

impl PopulateError {
    /// Truncate a response body to avoid logging excessive data
    fn excerpt(body: &[u8]) -> String {
        let text = String::from_utf8_lossy(body);
        if text.chars().count() <= MAX_ERROR_BODY_LENGTH {
            text.into_owned()
        } else {
            let head: String = text.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }

    pub fn from_status(identity: RequestIdentity, asset: &Asset) -> Self {
        PopulateError::Status {
            identity,
            status: asset.status,
            excerpt: Self::excerpt(&asset.body),
        }
    }
}

/// Why an intercepted request could not be answered.
#[derive(Error, Debug)]
pub enum InterceptError {
    #[error("Cache is not ready - no completed populate for the current epoch")]
    NotReady,

    #[error("Network fallback failed for {identity}: {source}")]
    Network {
        identity: RequestIdentity,
        #[source]
        source: FetchError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 50).into_bytes();
        let asset = Asset::new(500, vec![], body);
        let err = PopulateError::from_status(RequestIdentity::get("/"), &asset);
        match err {
            PopulateError::Status { status, excerpt, .. } => {
                assert_eq!(status, 500);
                assert!(excerpt.contains("truncated, 250 total bytes"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_error_short_body_kept() {
        let asset = Asset::new(404, vec![], b"Not Found".to_vec());
        let err = PopulateError::from_status(RequestIdentity::get("/missing.js"), &asset);
        assert_eq!(
            err.to_string(),
            "Seed asset GET /missing.js returned status 404: Not Found"
        );
    }
}
