use crate::error::{ResolveError, StrategyFailure};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// Desktop browser identity presented to the upstream.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) \
    Chrome/131.0.0.0 Safari/537.36";

/// Thin wrapper around a shared `reqwest::Client`.
///
/// Cloning is cheap and clones share one connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Result<Self, ResolveError> {
        Self::new_with_config(FetcherConfig::default())
    }

    /// Creates a Fetcher with custom configuration.
    pub fn new_with_config(config: FetcherConfig) -> Result<Self, ResolveError> {
        let mut client_builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10);

        if let Some(headers) = config.headers {
            client_builder = client_builder.default_headers(headers);
        }

        if let Some(redirect_policy) = config.redirect_policy {
            client_builder = client_builder.redirect(redirect_policy);
        }

        let client = client_builder.build().map_err(|e| {
            error!(error = %e, "Failed to create HTTP client");
            ResolveError::ClientBuildError(e.to_string())
        })?;

        Ok(Self { client })
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn get_json(&self, url: &str) -> Result<Value, StrategyFailure> {
        debug!(url = %url, "Fetching JSON document");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json,text/plain,*/*")
            .send()
            .await?;

        Self::read_json(response).await
    }

    #[instrument(level = "debug", skip(self, form, headers), err)]
    pub async fn post_form(
        &self,
        url: &str,
        headers: HeaderMap,
        form: &[(&str, String)],
    ) -> Result<Value, StrategyFailure> {
        debug!(url = %url, fields = form.len(), "Posting form request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .form(form)
            .send()
            .await?;

        Self::read_json(response).await
    }

    /// Follows redirects and returns the URL the chain ended on.
    /// The response body is never read.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn final_url(&self, url: &Url) -> Result<Url, StrategyFailure> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyFailure::Status(status.as_u16()));
        }

        debug!(from = %url, to = %response.url(), "Redirect chain resolved");
        Ok(response.url().clone())
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, StrategyFailure> {
        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "Upstream answered with non-success status");
            return Err(StrategyFailure::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(
                error = %e,
                preview = %crate::utils::truncate_str(&body, 120),
                "Response body is not JSON"
            );
            StrategyFailure::InvalidBody(e.to_string())
        })
    }
}

// for Instagram
impl Fetcher {
    #[instrument(level = "debug")]
    pub fn new_instagram_client(timeout: Duration) -> Result<Self, ResolveError> {
        debug!("Creating Instagram-specific fetcher");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("same-origin"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("cors"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("empty"),
        );

        Self::new_with_config(FetcherConfig {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout,
            headers: Some(headers),
            redirect_policy: Some(reqwest::redirect::Policy::limited(10)),
        })
    }
}

/// Options for building a [`Fetcher`].
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     user_agent: "my-agent/1.0".to_string(),
///     timeout: Duration::from_secs(5),
///     headers: None,
///     redirect_policy: None,
/// })?;
/// ```
#[derive(Debug)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: Option<HeaderMap>,
    pub redirect_policy: Option<reqwest::redirect::Policy>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            headers: None,
            redirect_policy: None,
        }
    }
}
