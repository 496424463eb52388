use crate::classifier::{Classification, UrlClassifier};
use crate::error::ResolveError;
use crate::fetcher::Fetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Turns an indirect share link into a direct post or reel URL.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, share_url: &Url) -> Result<String, ResolveError>;
}

/// Follows the share link's redirect chain over HTTP.
#[derive(Clone, Debug)]
pub struct ShareLinkResolver {
    fetcher: Fetcher,
    classifier: UrlClassifier,
    timeout: Duration,
}

impl ShareLinkResolver {
    pub fn new(fetcher: Fetcher, classifier: UrlClassifier, timeout: Duration) -> Self {
        Self {
            fetcher,
            classifier,
            timeout,
        }
    }
}

#[async_trait]
impl LinkResolver for ShareLinkResolver {
    #[instrument(level = "debug", skip(self), err)]
    async fn resolve(&self, share_url: &Url) -> Result<String, ResolveError> {
        let final_url = tokio::time::timeout(self.timeout, self.fetcher.final_url(share_url))
            .await
            .map_err(|_| ResolveError::ResolutionError("share link request timed out".into()))?
            .map_err(|e| ResolveError::ResolutionError(e.to_string()))?;

        match self.classifier.classify(final_url.as_str()) {
            Ok(Classification::Direct(post)) => {
                debug!(post = %post, url = %final_url, "Share link resolved");
                Ok(final_url.to_string())
            }
            Ok(Classification::Share(_)) => Err(ResolveError::ResolutionError(format!(
                "share link redirected to another share link: {final_url}"
            ))),
            Err(e) => Err(ResolveError::ResolutionError(format!(
                "share link resolved to unrecognized URL {final_url}: {e}"
            ))),
        }
    }
}
