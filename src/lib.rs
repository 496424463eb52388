use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

mod classifier;
mod error;
mod fetcher;
#[cfg(feature = "logging")]
mod logging;
mod normalizer;
mod resolver;
mod resolver_service;
mod strategy;
mod utils;
mod visit_log;

pub use classifier::{Classification, UrlClassifier, INSTAGRAM_DOMAIN};
pub use error::{ResolveError, StrategyFailure};
pub use fetcher::{Fetcher, FetcherConfig, BROWSER_USER_AGENT};
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_resolution_card, setup_logging, LogConfig};
pub use normalizer::{media_filename, MediaNormalizer};
pub use resolver::{LinkResolver, ShareLinkResolver};
pub use resolver_service::{
    ResolverConfig, ResolverService, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
    MAX_CONCURRENT_REQUESTS,
};
pub use strategy::{
    FetchStrategy, GraphQlStrategy, PageJsonStrategy, StrategyChain, StrategyKind, DEFAULT_DOC_ID,
};
pub use visit_log::{JsonLinesVisitLog, NoopVisitLog, TracingVisitLog, Visit, VisitLog, VisitOutcome};

/// The two post shapes the upstream serves media for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Post,
    Reel,
}

impl PostKind {
    /// Path segment used by the upstream for this kind.
    pub fn path_segment(&self) -> &'static str {
        match self {
            PostKind::Post => "p",
            PostKind::Reel => "reel",
        }
    }
}

/// Identifier of a single post, produced by classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostReference {
    pub id: String,
    pub kind: PostKind,
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.path_segment(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image => "jpg",
        }
    }
}

/// One downloadable image or video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub filename: String,
}

/// A successful resolution: never empty, items in carousel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub post: PostReference,
    pub items: Vec<MediaItem>,
}

#[async_trait]
pub trait MediaResolver {
    async fn resolve(&self, url: &str) -> Result<Resolution, ResolveError>;
}

/// Whether `url` is a post, reel or share link on instagram.com. Performs no
/// network access.
pub fn is_instagram_url(url: &str) -> bool {
    UrlClassifier::default().classify(url).is_ok()
}
