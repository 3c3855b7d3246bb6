use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default method for seed entries declared as bare URLs.
const DEFAULT_METHOD: &str = "GET";

/// Canonical lookup key for a cached asset: method + URL.
///
/// The method is upper-cased. Absolute URLs go through the URL parser so that
/// `https://cdn.tailwindcss.com` and `https://cdn.tailwindcss.com/` name the same
/// asset; origin-relative references such as `/index.html` are kept verbatim.
/// Query and fragment are always significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "IdentityRepr")]
pub struct RequestIdentity {
    method: String,
    url: String,
}

/// Seed sets may list bare URLs (implying GET) or explicit method/url pairs.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdentityRepr {
    Url(String),
    Full {
        #[serde(default = "default_method")]
        method: String,
        url: String,
    },
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

impl From<IdentityRepr> for RequestIdentity {
    fn from(repr: IdentityRepr) -> Self {
        match repr {
            IdentityRepr::Url(url) => Self::get(&url),
            IdentityRepr::Full { method, url } => Self::new(&method, &url),
        }
    }
}

impl RequestIdentity {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            url: Self::canonical_url(url.trim()),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(DEFAULT_METHOD, url)
    }

    fn canonical_url(url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) => parsed.to_string(),
            // Relative reference; see `anchored` and `resolve`
            Err(_) => url.to_string(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolve to an absolute URL, joining relative references onto `origin`.
    pub fn resolve(&self, origin: Option<&Url>) -> Result<Url, url::ParseError> {
        match Url::parse(&self.url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match origin {
                Some(origin) => origin.join(&self.url),
                None => Err(url::ParseError::RelativeUrlWithoutBase),
            },
            Err(e) => Err(e),
        }
    }

    /// Same identity with a relative reference joined onto `origin`.
    ///
    /// Absolute identities, and relative ones when no origin is known, come
    /// back unchanged, as do references the origin cannot join.
    pub fn anchored(&self, origin: Option<&Url>) -> Self {
        match self.resolve(origin) {
            Ok(url) => Self {
                method: self.method.clone(),
                url: url.to_string(),
            },
            Err(_) => self.clone(),
        }
    }

    /// Stable text form used for hashing and logging.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Filename-safe digest of the cache key.
    pub fn file_stem(&self) -> String {
        use sha2::{Digest, Sha256};

        let hash = Sha256::digest(self.cache_key().as_bytes());
        format!("{hash:x}")
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An outgoing resource request as issued by the application shell.
///
/// Only method and URL take part in cache matching; request headers are
/// forwarded untouched when the request has to go to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ContentRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(DEFAULT_METHOD, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(&self.method, &self.url)
    }
}

impl From<&RequestIdentity> for ContentRequest {
    fn from(identity: &RequestIdentity) -> Self {
        Self::new(identity.method(), identity.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_normalizes_method() {
        let id = RequestIdentity::new("get", "/index.html");
        assert_eq!(id.method(), "GET");
        assert_eq!(id, RequestIdentity::get("/index.html"));
        assert_ne!(id, RequestIdentity::new("POST", "/index.html"));
    }

    #[test]
    fn test_identity_absolute_url_normalized() {
        let a = RequestIdentity::get("https://cdn.tailwindcss.com");
        let b = RequestIdentity::get("https://CDN.tailwindcss.com/");
        assert_eq!(a, b);
        assert_eq!(a.url(), "https://cdn.tailwindcss.com/");
    }

    #[test]
    fn test_identity_query_and_fragment_significant() {
        let plain = RequestIdentity::get("/manifest.json");
        let query = RequestIdentity::get("/manifest.json?v=2");
        let fragment = RequestIdentity::get("/manifest.json#icons");
        assert_ne!(plain, query);
        assert_ne!(plain, fragment);
        assert_ne!(query, fragment);
        assert_ne!(plain.file_stem(), query.file_stem());
    }

    #[test]
    fn test_identity_resolve() {
        let origin = Url::parse("https://grass.coach/app/").unwrap();
        let rel = RequestIdentity::get("/index.html");
        assert_eq!(
            rel.resolve(Some(&origin)).unwrap().as_str(),
            "https://grass.coach/index.html"
        );
        assert!(rel.resolve(None).is_err());

        let abs = RequestIdentity::get("https://cdn.tailwindcss.com");
        assert_eq!(abs.resolve(None).unwrap().as_str(), "https://cdn.tailwindcss.com/");
    }

    #[test]
    fn test_identity_anchored_to_origin() {
        let origin = Url::parse("https://grass.coach/").unwrap();
        let rel = RequestIdentity::get("/manifest.json");
        let abs = RequestIdentity::get("https://grass.coach/manifest.json");

        assert_eq!(rel.anchored(Some(&origin)), abs);
        assert_eq!(abs.anchored(Some(&origin)), abs);
        assert_eq!(rel.anchored(None), rel);

        let head = RequestIdentity::new("HEAD", "/manifest.json").anchored(Some(&origin));
        assert_eq!(head.method(), "HEAD");
        assert_ne!(head, abs);
    }

    #[test]
    fn test_identity_deserialize_forms() {
        let ids: Vec<RequestIdentity> =
            serde_json::from_str(r#"["/", {"url": "/a"}, {"method": "head", "url": "/b"}]"#)
                .unwrap();
        assert_eq!(ids[0], RequestIdentity::get("/"));
        assert_eq!(ids[1], RequestIdentity::get("/a"));
        assert_eq!(ids[2], RequestIdentity::new("HEAD", "/b"));

        // Serialized form reads back through the explicit-pair shape
        let json = serde_json::to_string(&ids[2]).unwrap();
        let back: RequestIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ids[2]);
    }

    #[test]
    fn test_file_stem_is_hex_digest() {
        let stem = RequestIdentity::get("/").file_stem();
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_request_identity() {
        let req = ContentRequest::get("/manifest.json").with_header("Accept", "application/json");
        assert_eq!(req.identity(), RequestIdentity::get("/manifest.json"));
        assert_eq!(req.headers.len(), 1);
    }
}
