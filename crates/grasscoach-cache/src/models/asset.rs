use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured response: status, headers and body bytes.
///
/// Assets are stored verbatim and returned verbatim; nothing about them is
/// revalidated after capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            captured_at: Utc::now(),
        }
    }

    /// Status in the 200-299 range, the same test `fetch().ok` applies.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Split into the JSON-friendly head and the raw body.
    pub(crate) fn into_parts(self) -> (AssetHead, Vec<u8>) {
        let head = AssetHead {
            status: self.status,
            headers: self.headers,
            captured_at: self.captured_at,
            body_len: self.body.len() as u64,
        };
        (head, self.body)
    }

    pub(crate) fn from_parts(head: AssetHead, body: Vec<u8>) -> Self {
        Self {
            status: head.status,
            headers: head.headers,
            body,
            captured_at: head.captured_at,
        }
    }
}

/// Everything about an asset except its body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AssetHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub captured_at: DateTime<Utc>,
    pub body_len: u64,
}
