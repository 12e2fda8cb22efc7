use {
    crate::{
        boundaries::HttpGateway,
        config::HttpSettings,
        errors::FetchError,
        httpext::{default_headers, FetchedDocument, DEFAULT_REDIRECT_LIMIT},
    },
    log::*,
    reqwest::{redirect::Policy as RedirectPolicy, Error as ReqwestError, Url},
};

/// [`HttpGateway`] backed by a Reqwest [Client][reqwest::Client].
#[derive(Clone, Debug)]
pub struct ReqwestHttpGateway {
    /// The Reqwest client.
    client: reqwest::Client,

    /// Largest body accepted.
    max_body_bytes: usize,
}

impl ReqwestHttpGateway {
    /// Create a new gateway from the given settings.
    ///
    /// # Errors
    ///
    /// This method fails if a TLS backend cannot be initialized, or the resolver
    /// cannot load the system configuration.
    pub fn new(settings: &HttpSettings) -> Result<Self, ReqwestError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(settings.user_agent.as_str())
            .default_headers(default_headers())
            .deflate(true)
            .gzip(true)
            .brotli(true)
            .redirect(RedirectPolicy::limited(DEFAULT_REDIRECT_LIMIT))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes,
        })
    }
}

impl HttpGateway for ReqwestHttpGateway {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        debug!("GET {url}");

        let response = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Failed to fetch NFe page {url}: {e}");
                return Err(FetchError::with_source(url, "request failed", e));
            }
        };

        let document = FetchedDocument::read(response, url.clone(), self.max_body_bytes).await?;

        match document.error_for_status() {
            Ok(document) => Ok(document),
            Err(e) => {
                debug!("Failed to fetch NFe page {url}: {e}");
                Err(FetchError::with_source(url, format!("status {}", e.status), e))
            }
        }
    }
}
