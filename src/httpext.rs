mod awserr;
mod client;
mod response;

pub use {awserr::*, client::*, response::*};

use reqwest::header::{HeaderMap, HeaderValue};

/// Maximum number of redirects followed for a single request.
pub const DEFAULT_REDIRECT_LIMIT: usize = 10;
const HEADER_ACCEPT: &str = "Accept";
const HEADER_ACCEPT_LANGUAGE: &str = "Accept-Language";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.5";

/// Return the default headers for a request.
pub fn default_headers() -> HeaderMap<HeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(HEADER_ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(HEADER_ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));

    headers
}
