use crate::error::{ResolveError, StrategyFailure};
use crate::fetcher::Fetcher;
use crate::normalizer::MediaNormalizer;
use crate::{MediaItem, PostReference};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Persisted query id of the post-detail GraphQL operation. The upstream
/// rotates it every few weeks; override through `ResolverConfig::doc_id`.
pub const DEFAULT_DOC_ID: &str = "8845758582119845";

/// Public web-app id sent with every GraphQL call.
const IG_APP_ID: &str = "936619743392459";
/// Static anti-CSRF token accepted for anonymous requests.
const FB_LSD_TOKEN: &str = "AVqbxe3J_YA";
const FB_ASBD_ID: &str = "129477";
const FRIENDLY_NAME: &str = "PolarisPostActionLoadPostQueryQuery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    PageJson,
    GraphQl,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageJson => write!(f, "page-json"),
            Self::GraphQl => write!(f, "graphql"),
        }
    }
}

/// One self-contained way of retrieving the raw post document.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn fetch(&self, post: &PostReference) -> Result<Value, StrategyFailure>;
}

/// `GET /{p|reel}/{id}/?__a=1&__d=dis`. Cheap, but frequently degraded.
#[derive(Clone, Debug)]
pub struct PageJsonStrategy {
    fetcher: Fetcher,
    base_url: String,
}

impl PageJsonStrategy {
    pub fn new(fetcher: Fetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, post: &PostReference) -> String {
        format!(
            "{}/{}/{}/?__a=1&__d=dis",
            self.base_url,
            post.kind.path_segment(),
            post.id
        )
    }
}

#[async_trait]
impl FetchStrategy for PageJsonStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PageJson
    }

    async fn fetch(&self, post: &PostReference) -> Result<Value, StrategyFailure> {
        self.fetcher.get_json(&self.endpoint(post)).await
    }
}

/// `POST /api/graphql` with the web client's form payload.
#[derive(Clone, Debug)]
pub struct GraphQlStrategy {
    fetcher: Fetcher,
    base_url: String,
    doc_id: String,
}

impl GraphQlStrategy {
    pub fn new(fetcher: Fetcher, base_url: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            doc_id: doc_id.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/graphql", self.base_url)
    }

    /// The form body; only `variables` depends on the post.
    pub fn form(&self, post: &PostReference) -> Vec<(&'static str, String)> {
        let variables = json!({
            "shortcode": post.id,
            "fetch_tagged_user_count": null,
            "hoisted_comment_id": null,
            "hoisted_reply_id": null
        });

        vec![
            ("av", "0".to_string()),
            ("__d", "www".to_string()),
            ("__user", "0".to_string()),
            ("__a", "1".to_string()),
            ("__req", "3".to_string()),
            ("__hs", "19624.HYP:instagram_web_pkg.2.1..0.0".to_string()),
            ("dpr", "3".to_string()),
            ("__ccg", "UNKNOWN".to_string()),
            ("__rev", "1008824440".to_string()),
            ("__s", "xf44ne:zhh75g:xr51e7".to_string()),
            ("__hsi", "7282217488877343271".to_string()),
            ("__dyn", "7xeUmwlEnwn8K2WnFw9-2i5U4e0yoW3q32360CEbo1nEhw2nVE4W0om78b87C0yE5ufz81s8hwGwQwoEcE7O2l0Fwqo31w9a9x-0z8-U2zxe2GewGwso88cobEaU2eUlwhEe87q7-0iK2S3qazo7u1xwIw8O321LwTwKG1pg661pwr86C1mwraCg".to_string()),
            ("__csr", "gZ3yFmJkillQvV6ybimnG8AmhqujGbLADgjyEOWz49z9XDlAXBJpC7Wy-vQTSvUGWGh5u8KibG44dBiigrgjDxGjU0150Q0848azk48N09C02IR0go4SaR70r8owyg9pU0V23hwiA0LQczA48S0f-x-27o05NG0fkw".to_string()),
            ("__comet_req", "7".to_string()),
            ("lsd", FB_LSD_TOKEN.to_string()),
            ("jazoest", "2957".to_string()),
            ("__spin_r", "1008824440".to_string()),
            ("__spin_b", "trunk".to_string()),
            ("__spin_t", "1695523385".to_string()),
            ("fb_api_caller_class", "RelayModern".to_string()),
            ("fb_api_req_friendly_name", FRIENDLY_NAME.to_string()),
            ("variables", variables.to_string()),
            ("server_timestamps", "true".to_string()),
            ("doc_id", self.doc_id.clone()),
        ]
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-ig-app-id"),
            HeaderValue::from_static(IG_APP_ID),
        );
        headers.insert(
            HeaderName::from_static("x-fb-lsd"),
            HeaderValue::from_static(FB_LSD_TOKEN),
        );
        headers.insert(
            HeaderName::from_static("x-asbd-id"),
            HeaderValue::from_static(FB_ASBD_ID),
        );
        headers.insert(
            HeaderName::from_static("x-fb-friendly-name"),
            HeaderValue::from_static(FRIENDLY_NAME),
        );
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Ok(origin) = HeaderValue::from_str(&self.base_url) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", self.base_url)) {
            headers.insert(REFERER, referer);
        }
        headers
    }
}

#[async_trait]
impl FetchStrategy for GraphQlStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GraphQl
    }

    async fn fetch(&self, post: &PostReference) -> Result<Value, StrategyFailure> {
        self.fetcher
            .post_form(&self.endpoint(), self.headers(), &self.form(post))
            .await
    }
}

/// Runs strategies in order and stops at the first one that normalizes to at
/// least one item. Each strategy gets exactly one attempt.
#[derive(Clone)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn FetchStrategy>>,
    normalizer: MediaNormalizer,
    attempt_timeout: Duration,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            normalizer: MediaNormalizer::new(),
            attempt_timeout,
        }
    }

    /// When every strategy fails, the last one decides the outcome: an
    /// unreachable upstream is `UpstreamUnavailable`, an empty answer is
    /// `NoMediaFound`.
    #[instrument(level = "debug", skip(self, post), fields(post = %post))]
    pub async fn fetch_media(&self, post: &PostReference) -> Result<Vec<MediaItem>, ResolveError> {
        let mut last_failure: Option<(StrategyKind, StrategyFailure)> = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            match self.attempt(strategy.as_ref(), post).await {
                Ok(items) => {
                    info!(strategy = %kind, count = items.len(), "Resolved media");
                    return Ok(items);
                }
                Err(failure) => {
                    warn!(strategy = %kind, error = %failure, "Strategy produced no media");
                    last_failure = Some((kind, failure));
                }
            }
        }

        match last_failure {
            Some((kind, failure)) if failure.is_unavailable() => Err(
                ResolveError::UpstreamUnavailable(format!("{kind} strategy: {failure}")),
            ),
            _ => Err(ResolveError::NoMediaFound),
        }
    }

    async fn attempt(
        &self,
        strategy: &dyn FetchStrategy,
        post: &PostReference,
    ) -> Result<Vec<MediaItem>, StrategyFailure> {
        debug!(strategy = %strategy.kind(), "Attempting strategy");

        let raw = tokio::time::timeout(self.attempt_timeout, strategy.fetch(post))
            .await
            .map_err(|_| StrategyFailure::Timeout)??;

        let items = self.normalizer.normalize(&raw, strategy.kind());
        if items.is_empty() {
            return Err(StrategyFailure::Empty);
        }
        Ok(items)
    }
}
