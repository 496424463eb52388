use crate::classifier::{Classification, UrlClassifier, INSTAGRAM_DOMAIN};
use crate::error::ResolveError;
use crate::fetcher::Fetcher;
use crate::resolver::{LinkResolver, ShareLinkResolver};
use crate::strategy::{
    FetchStrategy, GraphQlStrategy, PageJsonStrategy, StrategyChain, DEFAULT_DOC_ID,
};
use crate::visit_log::{Visit, VisitLog};
use crate::{MediaResolver, PostReference, Resolution};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

pub const MAX_CONCURRENT_REQUESTS: usize = 100;
pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves post, reel and share URLs into media lists.
///
/// Holds no per-request state: clones share the HTTP client and the
/// strategy list read-only and may be used from many tasks at once.
/// Dropping a pending `resolve` future aborts its outstanding request.
#[derive(Clone)]
pub struct ResolverService {
    classifier: UrlClassifier,
    link_resolver: Arc<dyn LinkResolver>,
    chain: Arc<StrategyChain>,
    visit_log: Option<Arc<dyn VisitLog>>,
    // Max Concurrent Requests
    semaphore: Arc<Semaphore>,
}

impl ResolverService {
    pub fn new() -> Result<Self, ResolveError> {
        Self::new_with_config(ResolverConfig::default())
    }

    pub fn new_with_config(config: ResolverConfig) -> Result<Self, ResolveError> {
        debug!(
            base_url = %config.base_url,
            domain = %config.domain,
            "Initializing ResolverService"
        );

        let fetcher = match config.fetcher {
            Some(fetcher) => fetcher,
            None => Fetcher::new_instagram_client(config.request_timeout)?,
        };

        let classifier = UrlClassifier::new(config.domain);
        let link_resolver = Arc::new(ShareLinkResolver::new(
            fetcher.clone(),
            classifier.clone(),
            config.request_timeout,
        ));

        let strategies: Vec<Arc<dyn FetchStrategy>> = vec![
            Arc::new(PageJsonStrategy::new(fetcher.clone(), config.base_url.clone())),
            Arc::new(GraphQlStrategy::new(fetcher, config.base_url, config.doc_id)),
        ];
        let chain = StrategyChain::new(strategies, config.request_timeout);

        Ok(Self::from_parts(
            classifier,
            link_resolver,
            chain,
            config.max_concurrent_requests,
        ))
    }

    /// Assembles a service from already-built components.
    pub fn from_parts(
        classifier: UrlClassifier,
        link_resolver: Arc<dyn LinkResolver>,
        chain: StrategyChain,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            classifier,
            link_resolver,
            chain: Arc::new(chain),
            visit_log: None,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    pub fn with_visit_log(mut self, visit_log: Arc<dyn VisitLog>) -> Self {
        self.visit_log = Some(visit_log);
        self
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, url: &str) -> Result<Resolution, ResolveError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ResolveError::UpstreamUnavailable("resolver is shutting down".into()))?;

        let result = self.run_pipeline(url).await;
        if let Err(e) = &result {
            e.log();
        }
        self.record_visit(url, &result).await;
        result
    }

    /// Resolves every URL concurrently; results keep the input order.
    pub async fn resolve_batch(&self, urls: &[&str]) -> Vec<Result<Resolution, ResolveError>> {
        let futures: Vec<_> = urls.iter().map(|url| self.resolve(url)).collect();
        futures::future::join_all(futures).await
    }

    async fn run_pipeline(&self, url: &str) -> Result<Resolution, ResolveError> {
        debug!(stage = "validating", url = %url);
        let post = match self.classifier.classify(url)? {
            Classification::Direct(post) => post,
            Classification::Share(share_url) => {
                debug!(stage = "resolving", url = %share_url);
                let resolved = self.link_resolver.resolve(&share_url).await?;
                self.reclassify(&resolved)?
            }
        };

        debug!(stage = "fetching", post = %post);
        let items = self.chain.fetch_media(&post).await?;

        Ok(Resolution { post, items })
    }

    /// Resolver output goes back through the classifier; it is never trusted
    /// as-is.
    fn reclassify(&self, resolved: &str) -> Result<PostReference, ResolveError> {
        match self.classifier.classify(resolved) {
            Ok(Classification::Direct(post)) => Ok(post),
            Ok(Classification::Share(_)) => Err(ResolveError::ResolutionError(format!(
                "share link resolved to another share link: {resolved}"
            ))),
            Err(e) => Err(ResolveError::ResolutionError(format!(
                "share link resolved to unrecognized URL {resolved}: {e}"
            ))),
        }
    }

    async fn record_visit(&self, url: &str, result: &Result<Resolution, ResolveError>) {
        let Some(visit_log) = &self.visit_log else {
            return;
        };
        let visit = Visit::from_result(url, result);
        if let Err(e) = visit_log.record(&visit).await {
            warn!(error = %e, "Failed to record visit");
        }
    }
}

#[async_trait]
impl MediaResolver for ResolverService {
    async fn resolve(&self, url: &str) -> Result<Resolution, ResolveError> {
        ResolverService::resolve(self, url).await
    }
}

/// Configuration for [`ResolverService`].
#[derive(Debug)]
pub struct ResolverConfig {
    /// Accepted host, optionally prefixed with `www.`.
    pub domain: String,
    /// Scheme and host the fetch strategies talk to.
    pub base_url: String,
    pub doc_id: String,
    /// Bound on every outbound call.
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub fetcher: Option<Fetcher>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            domain: INSTAGRAM_DOMAIN.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            doc_id: DEFAULT_DOC_ID.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
            fetcher: None,
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by `INSTAGRAM_DOC_ID`, `INSTAGRAM_BASE_URL` and
    /// `INSTAGRAM_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(doc_id) = env_var("INSTAGRAM_DOC_ID") {
            config.doc_id = doc_id;
        }
        if let Some(base_url) = env_var("INSTAGRAM_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(raw) = env_var("INSTAGRAM_REQUEST_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "Ignoring invalid INSTAGRAM_REQUEST_TIMEOUT_SECS"),
            }
        }

        config
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = doc_id.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
