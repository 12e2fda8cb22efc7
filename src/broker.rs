//! Publishing extracted NFe data to SNS.
use {
    crate::{boundaries::MessageBroker, errors::PublishError, httpext::log_aws_err, nfe::NfeData},
    aws_sdk_sns::{types::MessageAttributeValue, Client as SnsClient},
    log::*,
    std::collections::HashMap,
};

const MSG_ATTR_ACCESS_KEY: &str = "AccessKey";
const MSG_ATTR_SOURCE_URL: &str = "SourceUrl";
const MSG_DATA_TYPE_STRING: &str = "String";
const FIFO_SUFFIX: &str = ".fifo";
const DEFAULT_MESSAGE_GROUP: &str = "nfe";

/// [`MessageBroker`] that publishes to an SNS topic.
#[derive(Clone, Debug)]
pub struct SnsMessageBroker {
    client: SnsClient,
    topic_arn: String,
}

impl SnsMessageBroker {
    /// Create a new broker publishing to `topic_arn`.
    pub fn new<S: Into<String>>(client: SnsClient, topic_arn: S) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

/// Everything needed for an SNS `Publish` call, independent of the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OutboundMessage {
    pub(crate) body: String,
    pub(crate) attributes: Vec<(&'static str, String)>,
    pub(crate) fifo: Option<FifoKeys>,
}

/// Ordering and deduplication keys for FIFO topics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FifoKeys {
    pub(crate) group_id: String,
    pub(crate) deduplication_id: String,
}

impl OutboundMessage {
    pub(crate) fn new(topic_arn: &str, data: &NfeData) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(data)?;
        let attributes =
            vec![(MSG_ATTR_ACCESS_KEY, data.access_key.clone()), (MSG_ATTR_SOURCE_URL, data.source_url.clone())];

        let fifo = is_fifo_topic(topic_arn).then(|| FifoKeys {
            group_id: data.issuer.cnpj_digits().unwrap_or_else(|| DEFAULT_MESSAGE_GROUP.to_string()),
            deduplication_id: data.access_key.clone(),
        });

        Ok(Self {
            body,
            attributes,
            fifo,
        })
    }
}

fn is_fifo_topic(topic_arn: &str) -> bool {
    topic_arn.ends_with(FIFO_SUFFIX)
}

impl MessageBroker for SnsMessageBroker {
    async fn publish(&self, data: &NfeData) -> Result<String, PublishError> {
        let message = match OutboundMessage::new(&self.topic_arn, data) {
            Ok(message) => message,
            Err(e) => return Err(PublishError::new(&self.topic_arn, e)),
        };

        let mut attributes = HashMap::with_capacity(message.attributes.len());
        for (name, value) in message.attributes {
            let value = MessageAttributeValue::builder()
                .data_type(MSG_DATA_TYPE_STRING)
                .string_value(value)
                .build()
                .map_err(|e| PublishError::new(&self.topic_arn, e))?;
            attributes.insert(name.to_string(), value);
        }

        let mut publish =
            self.client.publish().topic_arn(&self.topic_arn).message(message.body).set_message_attributes(Some(attributes));

        if let Some(fifo) = message.fifo {
            publish = publish.message_group_id(fifo.group_id).message_deduplication_id(fifo.deduplication_id);
        }

        let output = match log_aws_err(publish.send().await, "Publish") {
            Ok(output) => output,
            Err(e) => return Err(PublishError::new(&self.topic_arn, e)),
        };

        let message_id = output.message_id.unwrap_or_default();
        info!("Published NFe {} to {}: message_id={message_id}", data.access_key, self.topic_arn);
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{FifoKeys, OutboundMessage},
        crate::nfe::{Issuer, NfeData},
    };

    fn data() -> NfeData {
        NfeData {
            access_key: "43240212345678000190650010001234561000123456".to_string(),
            issuer: Issuer {
                name: "LOJA".to_string(),
                cnpj: Some("12.345.678/0001-90".to_string()),
                address: None,
            },
            source_url: "https://example.com/nfce?p=1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn standard_topic() {
        let message = OutboundMessage::new("arn:aws:sns:us-east-1:123456789012:nfe-data", &data()).unwrap();
        assert_eq!(message.fifo, None);
        assert_eq!(
            message.attributes,
            [
                ("AccessKey", "43240212345678000190650010001234561000123456".to_string()),
                ("SourceUrl", "https://example.com/nfce?p=1".to_string()),
            ]
        );

        let body: NfeData = serde_json::from_str(&message.body).unwrap();
        assert_eq!(body, data());
    }

    #[test]
    fn fifo_topic() {
        let message = OutboundMessage::new("arn:aws:sns:us-east-1:123456789012:nfe-data.fifo", &data()).unwrap();
        assert_eq!(
            message.fifo,
            Some(FifoKeys {
                group_id: "12345678000190".to_string(),
                deduplication_id: "43240212345678000190650010001234561000123456".to_string(),
            })
        );

        let mut anonymous = data();
        anonymous.issuer.cnpj = None;
        let message = OutboundMessage::new("arn:aws:sns:us-east-1:123456789012:nfe-data.fifo", &anonymous).unwrap();
        assert_eq!(message.fifo.unwrap().group_id, "nfe");
    }
}
