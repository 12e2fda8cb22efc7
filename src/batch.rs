//! Driving the use case over a batch of queue records.
use {
    crate::{
        boundaries::{HttpGateway, MessageBroker, NfeParser},
        errors::NfeError,
        shapes::{validate_batch, BatchItemFailure, BatchResponse, QueueRecord, RawEntry, ValidationError},
        usecase::ExtractAndPublishNfe,
    },
    futures::FutureExt,
    log::*,
    reqwest::Url,
    std::{
        any::Any,
        fmt::{Display, Formatter, Result as FmtResult},
        panic::AssertUnwindSafe,
        str::FromStr,
    },
};

const POLICY_CONTINUE: &str = "continue";
const POLICY_ABORT: &str = "abort";

/// What happens to the rest of a batch after a record fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep processing the remaining records.
    Continue,

    /// Stop at the first failure; the remaining records are skipped.
    #[default]
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            POLICY_CONTINUE => Ok(FailurePolicy::Continue),
            POLICY_ABORT => Ok(FailurePolicy::Abort),
            _ => Err(format!("expected {POLICY_CONTINUE} or {POLICY_ABORT}")),
        }
    }
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailurePolicy::Continue => f.write_str(POLICY_CONTINUE),
            FailurePolicy::Abort => f.write_str(POLICY_ABORT),
        }
    }
}

/// The result of one record.
#[derive(Debug)]
pub enum RecordOutcome {
    /// The NFe was extracted and published.
    Published,

    /// The pipeline failed for this record.
    Failed(NfeError),

    /// The record was not attempted because an earlier record aborted the batch.
    Skipped,
}

/// A record together with its outcome.
#[derive(Debug)]
pub struct RecordReport {
    /// Position of the record within the batch.
    pub index: usize,

    /// The SQS message id.
    pub message_id: Option<String>,

    /// The URL that was processed.
    pub url: Url,

    /// What happened.
    pub outcome: RecordOutcome,
}

/// Per-record outcomes of a batch, in batch order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per record, indexed by position in the batch.
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    /// The outcome of the record at `index`.
    pub fn outcome(&self, index: usize) -> Option<&RecordOutcome> {
        self.records.get(index).map(|r| &r.outcome)
    }

    /// Number of records published.
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Published))
    }

    /// Number of records that failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed(_)))
    }

    /// Number of records skipped.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Skipped))
    }

    fn count<F: Fn(&RecordOutcome) -> bool>(&self, f: F) -> usize {
        self.records.iter().filter(|r| f(&r.outcome)).count()
    }

    /// Build the function response.
    ///
    /// When `report_failures` is set, failed and skipped records are listed for redelivery; otherwise the
    /// response is empty and SQS considers every message consumed.
    pub fn response(&self, report_failures: bool) -> BatchResponse {
        if !report_failures {
            return BatchResponse::default();
        }

        let mut batch_item_failures = vec![];
        for record in &self.records {
            if matches!(record.outcome, RecordOutcome::Published) {
                continue;
            }

            match &record.message_id {
                Some(message_id) => batch_item_failures.push(BatchItemFailure {
                    item_identifier: message_id.clone(),
                }),
                None => warn!("Record {} ({}) has no message id and cannot be redelivered", record.index, record.url),
            }
        }

        BatchResponse {
            batch_item_failures,
        }
    }
}

/// Validate raw entries and process them.
///
/// A batch that fails validation is logged and rejected as a whole; no record is processed.
pub async fn process_batch<'a, G, P, B, I>(
    use_case: &ExtractAndPublishNfe<G, P, B>,
    entries: I,
    policy: FailurePolicy,
) -> Result<BatchReport, ValidationError>
where
    G: HttpGateway,
    P: NfeParser,
    B: MessageBroker,
    I: IntoIterator<Item = RawEntry<'a>>,
{
    let records = match validate_batch(entries) {
        Ok(records) => records,
        Err(e) => {
            let detail = serde_json::to_string(&e.violations).unwrap_or_else(|_| e.to_string());
            error!("Rejecting batch: {detail}");
            return Err(e);
        }
    };

    Ok(run_batch(use_case, records, policy).await)
}

/// Run the use case for each record, strictly in order.
pub async fn run_batch<G, P, B>(
    use_case: &ExtractAndPublishNfe<G, P, B>,
    records: Vec<QueueRecord>,
    policy: FailurePolicy,
) -> BatchReport
where
    G: HttpGateway,
    P: NfeParser,
    B: MessageBroker,
{
    let mut report = BatchReport {
        records: Vec::with_capacity(records.len()),
    };
    let mut aborted = false;

    for (index, record) in records.into_iter().enumerate() {
        let QueueRecord {
            message_id,
            url,
        } = record;

        if aborted {
            warn!("Skipping record {index} ({url}) after earlier failure");
            report.records.push(RecordReport {
                index,
                message_id,
                url,
                outcome: RecordOutcome::Skipped,
            });
            continue;
        }

        info!("Processing record {index} ({url})");

        let result = match AssertUnwindSafe(use_case.execute(&url)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(NfeError::Unexpected(panic_message(panic.as_ref()))),
        };

        let outcome = match result {
            Ok(()) => RecordOutcome::Published,
            Err(e) => {
                error!("Record {index} ({url}) failed with {}: {e}", e.kind());
                if policy == FailurePolicy::Abort {
                    aborted = true;
                }
                RecordOutcome::Failed(e)
            }
        };

        report.records.push(RecordReport {
            index,
            message_id,
            url,
            outcome,
        });
    }

    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{process_batch, FailurePolicy, RecordOutcome},
        crate::{
            errors::NfeError,
            shapes::{BatchItemFailure, RawEntry},
            testing::{CallLog, FakeBroker, FakeGateway, FakeParser},
            usecase::ExtractAndPublishNfe,
        },
    };

    type FakeUseCase = ExtractAndPublishNfe<FakeGateway, FakeParser, FakeBroker>;

    fn bodies(urls: &[&str]) -> Vec<(String, String)> {
        urls.iter().enumerate().map(|(i, url)| (format!("m{}", i + 1), format!(r#"{{"url": "{url}"}}"#))).collect()
    }

    fn entries(bodies: &[(String, String)]) -> Vec<RawEntry<'_>> {
        bodies
            .iter()
            .map(|(message_id, body)| RawEntry {
                message_id: Some(message_id),
                body: Some(body),
            })
            .collect()
    }

    fn use_case(log: &CallLog, gateway: FakeGateway, parser: FakeParser) -> FakeUseCase {
        ExtractAndPublishNfe::new(gateway, parser, FakeBroker::new(log))
    }

    #[test_log::test(tokio::test)]
    async fn valid_single_record() {
        let log = CallLog::default();
        let use_case = use_case(&log, FakeGateway::new(&log), FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/a"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Continue).await.unwrap();

        assert_eq!(report.published(), 1);
        assert_eq!(log.published().len(), 1);
        assert_eq!(log.published()[0].access_key, "key:https://example.com/a");
        assert!(report.response(true).batch_item_failures.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn malformed_url_processes_nothing() {
        let log = CallLog::default();
        let use_case = use_case(&log, FakeGateway::new(&log), FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/a", "not-a-url"]);

        let e = process_batch(&use_case, entries(&bodies), FailurePolicy::Continue).await.unwrap_err();

        assert_eq!(e.violations.len(), 1);
        assert_eq!(e.violations[0].index, 1);
        assert_eq!(e.violations[0].message_id.as_deref(), Some("m2"));
        assert!(log.calls().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn multi_record_success_in_order() {
        let log = CallLog::default();
        let use_case = use_case(&log, FakeGateway::new(&log), FakeParser::new(&log));
        let urls = ["https://example.com/1", "https://example.com/2", "https://example.com/3", "https://example.com/4"];
        let bodies = bodies(&urls);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Abort).await.unwrap();

        assert_eq!(report.published(), 4);
        let published: Vec<String> = log.published().into_iter().map(|d| d.source_url).collect();
        assert_eq!(published, urls);

        // Each record finishes before the next one starts.
        let calls = log.calls();
        assert_eq!(calls.len(), 12);
        assert_eq!(calls[3], "fetch https://example.com/2");
    }

    #[test_log::test(tokio::test)]
    async fn fetch_failure_aborts_batch() {
        let log = CallLog::default();
        let gateway = FakeGateway::new(&log).failing(&["https://example.com/1"]);
        let use_case = use_case(&log, gateway, FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/1", "https://example.com/2"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Abort).await.unwrap();

        assert!(matches!(report.outcome(0), Some(RecordOutcome::Failed(NfeError::Fetch(_)))));
        assert!(matches!(report.outcome(1), Some(RecordOutcome::Skipped)));
        assert_eq!(log.calls(), ["fetch https://example.com/1"]);
        assert!(log.published().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn default_policy_abandons_remaining_records() {
        let log = CallLog::default();
        let gateway = FakeGateway::new(&log).failing(&["https://example.com/1"]);
        let use_case = use_case(&log, gateway, FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/1", "https://example.com/2"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::default()).await.unwrap();

        assert_eq!((report.published(), report.failed(), report.skipped()), (0, 1, 1));
        assert!(matches!(report.outcome(1), Some(RecordOutcome::Skipped)));
        assert_eq!(log.calls(), ["fetch https://example.com/1"]);
        assert!(log.published().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn parser_failure_halts_batch_under_abort() {
        let log = CallLog::default();
        let parser = FakeParser::new(&log).failing(&["https://example.com/2"]);
        let use_case = use_case(&log, FakeGateway::new(&log), parser);
        let bodies = bodies(&["https://example.com/1", "https://example.com/2", "https://example.com/3"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Abort).await.unwrap();

        assert_eq!((report.published(), report.failed(), report.skipped()), (1, 1, 1));
        assert!(matches!(report.outcome(1), Some(RecordOutcome::Failed(NfeError::Parse(_)))));
        let published: Vec<String> = log.published().into_iter().map(|d| d.source_url).collect();
        assert_eq!(published, ["https://example.com/1"]);
        assert!(!log.calls().iter().any(|call| call.ends_with("example.com/3")));
    }

    #[test_log::test(tokio::test)]
    async fn continue_policy_isolates_failures() {
        let log = CallLog::default();
        let gateway = FakeGateway::new(&log).failing(&["https://example.com/1"]);
        let parser = FakeParser::new(&log).failing(&["https://example.com/3"]);
        let use_case = use_case(&log, gateway, parser);
        let bodies = bodies(&["https://example.com/1", "https://example.com/2", "https://example.com/3", "https://example.com/4"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Continue).await.unwrap();

        assert_eq!((report.published(), report.failed(), report.skipped()), (2, 2, 0));
        let published: Vec<String> = log.published().into_iter().map(|d| d.source_url).collect();
        assert_eq!(published, ["https://example.com/2", "https://example.com/4"]);
    }

    #[test_log::test(tokio::test)]
    async fn response_reports_failed_and_skipped() {
        let log = CallLog::default();
        let gateway = FakeGateway::new(&log).failing(&["https://example.com/2"]);
        let use_case = use_case(&log, gateway, FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/1", "https://example.com/2", "https://example.com/3"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Abort).await.unwrap();

        assert_eq!(
            report.response(true).batch_item_failures,
            [
                BatchItemFailure {
                    item_identifier: "m2".to_string()
                },
                BatchItemFailure {
                    item_identifier: "m3".to_string()
                },
            ]
        );
        assert!(report.response(false).batch_item_failures.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn panic_is_contained() {
        let log = CallLog::default();
        let gateway = FakeGateway::new(&log).panicking(&["https://example.com/1"]);
        let use_case = use_case(&log, gateway, FakeParser::new(&log));
        let bodies = bodies(&["https://example.com/1", "https://example.com/2"]);

        let report = process_batch(&use_case, entries(&bodies), FailurePolicy::Continue).await.unwrap();

        match report.outcome(0) {
            Some(RecordOutcome::Failed(NfeError::Unexpected(message))) => {
                assert_eq!(message, "gateway exploded on https://example.com/1")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(report.outcome(1), Some(RecordOutcome::Published)));
    }

    #[test]
    fn policy_names() {
        assert_eq!("continue".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert_eq!("ABORT".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert!("skip".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default().to_string(), "abort");
    }
}
