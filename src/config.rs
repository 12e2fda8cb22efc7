//! Function settings read from the environment at cold start.
use {
    crate::{batch::FailurePolicy, BoxError},
    aws_sdk_sns::Client as SnsClient,
    log::*,
    std::{env, str::FromStr, time::Duration},
};

const ENV_SNS_TOPIC_ARN: &str = "SNS_TOPIC_ARN";
const ENV_USER_AGENT: &str = "USER_AGENT";
const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const ENV_MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";
const ENV_BATCH_FAILURE_POLICY: &str = "BATCH_FAILURE_POLICY";
const ENV_REPORT_BATCH_ITEM_FAILURES: &str = "REPORT_BATCH_ITEM_FAILURES";

pub(crate) const DEFAULT_USER_AGENT: &str =
    concat!("Mozilla/5.0 (compatible; ", env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"), ")");
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Function configuration, read from the environment once per cold start.
#[derive(Clone, Debug)]
pub struct Config {
    /// The SNS client to publish with.
    pub sns_client: SnsClient,

    /// The SNS topic extracted NFe data is published to.
    pub topic_arn: String,

    /// The HTTP settings for fetching consultation pages.
    pub http: HttpSettings,

    /// What to do with the rest of a batch when a record fails.
    pub failure_policy: FailurePolicy,

    /// Whether failed records are reported back to SQS for redelivery.
    pub report_batch_item_failures: bool,
}

/// Settings for the HTTP gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpSettings {
    /// User agent to send.
    pub user_agent: String,

    /// Timeout for a single request, including reading the body.
    pub timeout: Duration,

    /// Largest body accepted.
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Create a new Config from environment variables.
    pub async fn from_env() -> Result<Self, BoxError> {
        let Some(topic_arn) = env_var(ENV_SNS_TOPIC_ARN) else {
            return Err(format!("{ENV_SNS_TOPIC_ARN} must be set").into());
        };

        let http = HttpSettings {
            user_agent: env_var(ENV_USER_AGENT).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(parse_var(ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?),
            max_body_bytes: parse_var(ENV_MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES)?,
        };
        let failure_policy = parse_var(ENV_BATCH_FAILURE_POLICY, FailurePolicy::default())?;
        let report_batch_item_failures = match env_var(ENV_REPORT_BATCH_ITEM_FAILURES) {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| format!("{ENV_REPORT_BATCH_ITEM_FAILURES} must be true or false, not {value:?}"))?,
            None => false,
        };

        let aws_config = aws_config::load_from_env().await;
        let sns_client = SnsClient::new(&aws_config);

        info!(
            "Configured: topic_arn={topic_arn} failure_policy={failure_policy} \
             report_batch_item_failures={report_batch_item_failures} timeout={:?}",
            http.timeout
        );

        Ok(Self {
            sns_client,
            topic_arn,
            http,
            failure_policy,
            report_batch_item_failures,
        })
    }
}

/// Read an environment variable, treating an empty value as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value.trim().parse().map_err(|e| format!("Invalid {name} value {value:?}: {e}").into()),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
