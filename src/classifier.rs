use crate::error::ResolveError;
use crate::{PostKind, PostReference};
use url::Url;

pub const INSTAGRAM_DOMAIN: &str = "instagram.com";

/// Outcome of classifying a post URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The URL names a post or reel directly.
    Direct(PostReference),
    /// The URL is a share link that must be followed before it means anything.
    Share(Url),
}

/// Validates raw URLs and extracts the post they point at.
///
/// Only the configured domain (optionally prefixed with `www.`) is accepted;
/// other subdomains are rejected. Classification never touches the network.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    domain: String,
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(INSTAGRAM_DOMAIN)
    }
}

impl UrlClassifier {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn classify(&self, raw_url: &str) -> Result<Classification, ResolveError> {
        let url = Url::parse(raw_url.trim())
            .map_err(|e| ResolveError::validation(format!("malformed URL: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::validation(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ResolveError::validation("URL has no host"))?;
        if !self.is_expected_host(host) {
            return Err(ResolveError::validation(format!(
                "not an {} URL",
                self.domain
            )));
        }

        self.classify_path(&url)
    }

    fn is_expected_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.domain || host.strip_prefix("www.") == Some(self.domain.as_str())
    }

    fn classify_path(&self, url: &Url) -> Result<Classification, ResolveError> {
        let mut segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        // a single trailing slash is tolerated
        if segments.last() == Some(&"") {
            segments.pop();
        }

        let unmatched = || ResolveError::validation("path does not match post/reel/share pattern");

        let (prefix, id) = match segments.as_slice() {
            [prefix, id] => (*prefix, *id),
            // the app also emits /share/{p|reel}/{token}
            ["share", "p" | "reel" | "reels", token] => ("share", *token),
            _ => return Err(unmatched()),
        };
        if !is_valid_identifier(id) {
            return Err(unmatched());
        }

        let kind = match prefix {
            "p" => PostKind::Post,
            // legacy IGTV links are served through the reel endpoint
            "reel" | "reels" | "tv" => PostKind::Reel,
            "share" => return Ok(Classification::Share(url.clone())),
            _ => return Err(unmatched()),
        };

        Ok(Classification::Direct(PostReference {
            id: id.to_string(),
            kind,
        }))
    }
}

fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
