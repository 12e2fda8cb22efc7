//! AWS Lambda function that scrapes NFC-e consultation pages queued on SQS and publishes the extracted NFe data
//! to SNS.
//!
#![warn(clippy::all)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

/// Driving the use case over a batch of queue records.
pub mod batch;

/// Traits for the pipeline collaborators.
pub mod boundaries;

/// SNS message broker.
pub mod broker;

/// Environment configuration.
pub mod config;

/// Pipeline errors.
pub mod errors;

/// HTTP extension utilities.
pub mod httpext;

/// NFe data model and consultation page parser.
pub mod nfe;

/// Shapes used in the request and response.
pub mod shapes;

/// HTML parsing library.
pub mod soup;

/// The extract-and-publish use case.
pub mod usecase;

#[cfg(test)]
mod testing;

use {
    crate::{
        batch::{process_batch, BatchReport},
        broker::SnsMessageBroker,
        config::Config,
        httpext::ReqwestHttpGateway,
        nfe::SefazNfeParser,
        shapes::{BatchItemFailure, BatchResponse, RawEntry, ValidationError},
        usecase::ExtractAndPublishNfe,
    },
    aws_lambda_events::sqs::{SqsEvent, SqsMessage},
    lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent},
    log::*,
    std::{error::Error, sync::Arc},
};

/// Dynamic error type that is safe to send across threads.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    env_logger::init();
    let config = Arc::new(Config::from_env().await?);

    let func = service_fn(move |event: LambdaEvent<SqsEvent>| {
        let config = config.clone();
        async move { handler(&config, event).await }
    });
    run(func).await?;
    Ok(())
}

async fn handler(config: &Config, event: LambdaEvent<SqsEvent>) -> Result<BatchResponse, LambdaError> {
    let (request, context) = event.into_parts();
    info!("Received {} records in request {}", request.records.len(), context.request_id);

    let gateway = match ReqwestHttpGateway::new(&config.http) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Unable to build HTTP client: {e}");
            return Ok(redeliver_all(&request.records, config.report_batch_item_failures));
        }
    };
    let broker = SnsMessageBroker::new(config.sns_client.clone(), &config.topic_arn);
    let use_case = ExtractAndPublishNfe::new(gateway, SefazNfeParser, broker);

    let entries = request.records.iter().map(RawEntry::from);
    let outcome = process_batch(&use_case, entries, config.failure_policy).await;

    Ok(batch_response(&outcome, config.report_batch_item_failures))
}

/// Turn the outcome of a batch into the answer for SQS.
fn batch_response(outcome: &Result<BatchReport, ValidationError>, report_failures: bool) -> BatchResponse {
    match outcome {
        Ok(report) => {
            info!(
                "Batch complete: {} published, {} failed, {} skipped",
                report.published(),
                report.failed(),
                report.skipped()
            );
            report.response(report_failures)
        }
        // Malformed messages are consumed; redelivery cannot fix them.
        Err(_) => BatchResponse::default(),
    }
}

/// Ask SQS to redeliver every message of the batch, if failures are reported at all.
fn redeliver_all(records: &[SqsMessage], report_failures: bool) -> BatchResponse {
    if !report_failures {
        return BatchResponse::default();
    }

    BatchResponse {
        batch_item_failures: records
            .iter()
            .filter_map(|record| record.message_id.clone())
            .map(|item_identifier| BatchItemFailure {
                item_identifier,
            })
            .collect(),
    }
}
