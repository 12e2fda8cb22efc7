use {
    crate::errors::FetchError,
    bytes::{BufMut, Bytes, BytesMut},
    futures::StreamExt,
    log::*,
    reqwest::{
        header::{HeaderMap, HeaderValue, CONTENT_TYPE},
        StatusCode, Url,
    },
    sha2::{Digest, Sha256},
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
        str::Utf8Error,
    },
};

const INITIAL_BODY_CAPACITY: usize = 65536;

/// A fully read HTTP response for a consultation page.
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    /// The URL that was requested.
    requested_url: Url,

    /// The URL of the response, after redirects.
    url: Url,

    /// The response's status
    status: StatusCode,

    /// The response's headers
    headers: HeaderMap<HeaderValue>,

    /// The body of the response.
    body: Bytes,

    /// Hex-encoded SHA-256 of the body.
    sha256: String,
}

/// Error returned when an HTTP status code is not in the 200-399 range.
#[derive(Debug)]
pub struct HttpStatusError {
    /// The status code that was returned.
    pub status: StatusCode,

    /// The URL that was requested.
    pub url: Url,
}

impl Display for HttpStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "HTTP request to {} failed: status code {}", self.url, self.status)
    }
}

impl Error for HttpStatusError {}

impl FetchedDocument {
    /// Read a Reqwest [response][reqwest::Response] to the end, refusing bodies larger than `max_body_bytes`.
    pub async fn read(resp: reqwest::Response, requested_url: Url, max_body_bytes: usize) -> Result<Self, FetchError> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let url = resp.url().clone();

        if let Some(content_length) = resp.content_length() {
            if content_length > max_body_bytes as u64 {
                return Err(FetchError::new(
                    &requested_url,
                    format!("body of {content_length} bytes exceeds limit of {max_body_bytes} bytes"),
                ));
            }
        }

        let mut body = BytesMut::with_capacity(INITIAL_BODY_CAPACITY.min(max_body_bytes));
        let mut stream = resp.bytes_stream();
        let mut sha256 = Sha256::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Err(FetchError::with_source(&requested_url, "failed to read body", e)),
            };

            if body.len() + chunk.len() > max_body_bytes {
                return Err(FetchError::new(&requested_url, format!("body exceeds limit of {max_body_bytes} bytes")));
            }

            body.put_slice(&chunk);
            sha256.update(&chunk);
        }

        let body = body.freeze();
        let sha256 = hex::encode(sha256.finalize());

        debug!("HTTP: {requested_url} status {status}, content-length {}, sha256 {sha256}", body.len());

        Ok(Self {
            requested_url,
            url,
            status,
            headers,
            body,
            sha256,
        })
    }

    /// Get the `Url` that was requested.
    #[inline(always)]
    pub fn requested_url(&self) -> &Url {
        &self.requested_url
    }

    /// Get the final `Url` of this response.
    #[inline(always)]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the `StatusCode` of this response.
    #[inline(always)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the value of the `Content-Type` header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    /// Get the content-length of this response.
    #[inline(always)]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Get the hex-encoded SHA-256 digest of the body.
    #[inline(always)]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Get the full response text.
    ///
    /// The body must be valid UTF-8; no charset conversion is performed.
    #[inline(always)]
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Turn a response into an error if the server returned an error.
    pub fn error_for_status(self) -> Result<Self, HttpStatusError> {
        let status = self.status();
        if status.is_client_error() || status.is_server_error() {
            Err(HttpStatusError {
                status,
                url: self.url().clone(),
            })
        } else {
            Ok(self)
        }
    }

    /// Build a document from parts without going over the network.
    #[cfg(test)]
    pub(crate) fn from_parts(url: &str, body: &str) -> Self {
        Self::from_bytes(url, body.as_bytes())
    }

    /// Build a document from a raw body without going over the network.
    #[cfg(test)]
    pub(crate) fn from_bytes(url: &str, body: &[u8]) -> Self {
        let url = Url::parse(url).expect("valid test URL");
        let sha256 = hex::encode(Sha256::digest(body));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));

        Self {
            requested_url: url.clone(),
            url,
            status: StatusCode::OK,
            headers,
            body: Bytes::copy_from_slice(body),
            sha256,
        }
    }
}
