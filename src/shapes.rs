//! Shapes for the queue event payloads and the function response.

use {
    aws_lambda_events::sqs::SqsMessage,
    reqwest::Url,
    serde::{Deserialize, Serialize},
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

const FIELD_BODY: &str = "body";
const FIELD_URL: &str = "url";
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// A borrowed view of one queue message as delivered to the function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawEntry<'a> {
    /// The SQS message id, if the runtime supplied one.
    pub message_id: Option<&'a str>,

    /// The JSON-encoded message body.
    pub body: Option<&'a str>,
}

impl<'a> From<&'a SqsMessage> for RawEntry<'a> {
    fn from(message: &'a SqsMessage) -> Self {
        Self {
            message_id: message.message_id.as_deref(),
            body: message.body.as_deref(),
        }
    }
}

/// The JSON body of a queue message.
#[derive(Clone, Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    url: Option<serde_json::Value>,
}

/// A validated queue record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueRecord {
    /// The SQS message id, kept for failure reporting.
    pub message_id: Option<String>,

    /// The URL of the NFe consultation page.
    pub url: Url,
}

/// A single problem found while validating a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Position of the offending entry within the batch.
    pub index: usize,

    /// The SQS message id of the offending entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// The field at fault.
    pub path: &'static str,

    /// Human-readable description.
    pub message: String,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] ", self.index)?;
        if let Some(message_id) = &self.message_id {
            write!(f, "message {message_id} ")?;
        }
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The batch could not be validated; no record may be processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Every violation found, in entry order.
    pub violations: Vec<Violation>,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Invalid batch ({} violations)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

/// Validate a batch of raw entries.
///
/// Either every entry yields a [`QueueRecord`], in input order, or the whole batch is rejected with all
/// violations found.
pub fn validate_batch<'a, I>(entries: I) -> Result<Vec<QueueRecord>, ValidationError>
where
    I: IntoIterator<Item = RawEntry<'a>>,
{
    let mut records = vec![];
    let mut violations = vec![];

    for (index, entry) in entries.into_iter().enumerate() {
        match validate_entry(entry) {
            Ok(url) => records.push(QueueRecord {
                message_id: entry.message_id.map(str::to_string),
                url,
            }),
            Err((path, message)) => violations.push(Violation {
                index,
                message_id: entry.message_id.map(str::to_string),
                path,
                message,
            }),
        }
    }

    if violations.is_empty() {
        Ok(records)
    } else {
        Err(ValidationError {
            violations,
        })
    }
}

fn validate_entry(entry: RawEntry<'_>) -> Result<Url, (&'static str, String)> {
    let Some(body) = entry.body else {
        return Err((FIELD_BODY, "Message has no body".to_string()));
    };

    let body: MessageBody = match serde_json::from_str(body) {
        Ok(body) => body,
        Err(e) => return Err((FIELD_BODY, format!("Invalid JSON body: {e}"))),
    };

    let url = match body.url {
        None | Some(serde_json::Value::Null) => return Err((FIELD_URL, "Required".to_string())),
        Some(serde_json::Value::String(url)) => url,
        Some(other) => return Err((FIELD_URL, format!("Expected string, received {}", json_type_name(&other)))),
    };

    let url = match Url::parse(&url) {
        Ok(url) => url,
        Err(e) => return Err((FIELD_URL, format!("Invalid url: {e}"))),
    };

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err((FIELD_URL, format!("Unsupported url scheme: {}", url.scheme())));
    }

    Ok(url)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Partial batch response understood by the SQS event source mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Messages that should be made visible again for redelivery.
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// A single message to be redelivered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    /// The SQS message id.
    pub item_identifier: String,
}
