//! The extract-and-publish use case: fetch a consultation page, extract the NFe and publish it.
use {
    crate::{
        boundaries::{HttpGateway, MessageBroker, NfeParser},
        errors::NfeError,
    },
    log::*,
    reqwest::Url,
};

/// Runs Gateway → Parser → Broker for one URL.
#[derive(Debug)]
pub struct ExtractAndPublishNfe<G, P, B> {
    gateway: G,
    parser: P,
    broker: B,
}

impl<G, P, B> ExtractAndPublishNfe<G, P, B>
where
    G: HttpGateway,
    P: NfeParser,
    B: MessageBroker,
{
    /// Create a new use case from its three collaborators.
    pub fn new(gateway: G, parser: P, broker: B) -> Self {
        Self {
            gateway,
            parser,
            broker,
        }
    }

    /// Fetch `url`, extract its NFe and publish it.
    ///
    /// Each step runs only if the previous one succeeded; nothing is published unless extraction succeeded.
    pub async fn execute(&self, url: &Url) -> Result<(), NfeError> {
        let document = self.gateway.fetch(url).await?;
        debug!(
            "Fetched {url} (final {}): {} bytes of {}, sha256 {}",
            document.url(),
            document.content_length(),
            document.content_type().unwrap_or("unknown content"),
            document.sha256()
        );

        let data = self.parser.extract(&document)?;
        info!("Extracted NFe {} ({} items) from {url}", data.access_key, data.items.len());

        let message_id = self.broker.publish(&data).await?;
        debug!("NFe {} acknowledged as {message_id}", data.access_key);

        Ok(())
    }
}
