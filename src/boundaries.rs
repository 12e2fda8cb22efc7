//! The three capabilities the extract-and-publish pipeline depends on.
//!
//! Each trait has exactly one operation so that implementations can be swapped, for example for
//! recording fakes in tests.
use {
    crate::{
        errors::{FetchError, ParseError, PublishError},
        httpext::FetchedDocument,
        nfe::NfeData,
    },
    reqwest::Url,
    std::future::Future,
};

/// Retrieves the raw content behind a URL.
pub trait HttpGateway {
    /// Fetch `url`, failing on transport errors and non-success statuses.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedDocument, FetchError>> + Send;
}

/// Turns a fetched consultation page into structured invoice data.
pub trait NfeParser {
    /// Extract the invoice fields from `document`.
    fn extract(&self, document: &FetchedDocument) -> Result<NfeData, ParseError>;
}

/// Delivers extracted invoice data downstream.
pub trait MessageBroker {
    /// Publish `data`, returning the broker's message id.
    fn publish(&self, data: &NfeData) -> impl Future<Output = Result<String, PublishError>> + Send;
}
