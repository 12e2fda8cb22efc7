//! Recording fakes of the pipeline collaborators.
use {
    crate::{
        boundaries::{HttpGateway, MessageBroker, NfeParser},
        errors::{FetchError, ParseError, PublishError},
        httpext::FetchedDocument,
        nfe::NfeData,
    },
    reqwest::Url,
    std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    },
};

#[derive(Debug, Default)]
struct Calls {
    calls: Vec<String>,
    published: Vec<NfeData>,
}

/// Shared, ordered record of every collaborator call.
#[derive(Clone, Debug, Default)]
pub(crate) struct CallLog(Arc<Mutex<Calls>>);

impl CallLog {
    fn record(&self, call: String) {
        self.0.lock().unwrap().calls.push(call);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    pub(crate) fn published(&self) -> Vec<NfeData> {
        self.0.lock().unwrap().published.clone()
    }
}

fn url_set(urls: &[&str]) -> HashSet<String> {
    urls.iter().map(|url| url.to_string()).collect()
}

/// Serves a small page for every URL, except the ones configured to fail or panic.
#[derive(Debug)]
pub(crate) struct FakeGateway {
    log: CallLog,
    failing: HashSet<String>,
    panicking: HashSet<String>,
}

impl FakeGateway {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
        }
    }

    pub(crate) fn failing(mut self, urls: &[&str]) -> Self {
        self.failing = url_set(urls);
        self
    }

    pub(crate) fn panicking(mut self, urls: &[&str]) -> Self {
        self.panicking = url_set(urls);
        self
    }
}

impl HttpGateway for FakeGateway {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        self.log.record(format!("fetch {url}"));

        if self.panicking.contains(url.as_str()) {
            panic!("gateway exploded on {url}");
        }

        if self.failing.contains(url.as_str()) {
            return Err(FetchError::new(url, "status 503 Service Unavailable"));
        }

        Ok(FetchedDocument::from_parts(url.as_str(), &format!("<html>{url}</html>")))
    }
}

/// Produces NfeData keyed by the document URL, except for URLs configured to fail.
#[derive(Debug)]
pub(crate) struct FakeParser {
    log: CallLog,
    failing: HashSet<String>,
}

impl FakeParser {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
        }
    }

    pub(crate) fn failing(mut self, urls: &[&str]) -> Self {
        self.failing = url_set(urls);
        self
    }
}

impl NfeParser for FakeParser {
    fn extract(&self, document: &FetchedDocument) -> Result<NfeData, ParseError> {
        let url = document.requested_url().as_str();
        self.log.record(format!("extract {url}"));

        if self.failing.contains(url) {
            return Err(ParseError::new(url, "access key not found"));
        }

        Ok(NfeData {
            access_key: format!("key:{url}"),
            source_url: url.to_string(),
            ..Default::default()
        })
    }
}

/// Records every published message, except for sources configured to fail.
#[derive(Debug)]
pub(crate) struct FakeBroker {
    log: CallLog,
    failing: HashSet<String>,
}

impl FakeBroker {
    pub(crate) fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
        }
    }

    pub(crate) fn failing(mut self, urls: &[&str]) -> Self {
        self.failing = url_set(urls);
        self
    }
}

impl MessageBroker for FakeBroker {
    async fn publish(&self, data: &NfeData) -> Result<String, PublishError> {
        self.log.record(format!("publish {}", data.access_key));

        if self.failing.contains(&data.source_url) {
            return Err(PublishError::new("fake-topic", "throttled"));
        }

        let mut calls = self.log.0.lock().unwrap();
        calls.published.push(data.clone());
        Ok(format!("msg-{}", calls.published.len()))
    }
}
