//! AWS SQS queue backend (requires the `queue-sqs` Cargo feature).
//!
//! Multi-node deployments point the API and the workers at the same SQS
//! queue; redelivery and visibility timeouts then come from the provider
//! instead of the in-process broker.

#[cfg(not(feature = "queue-sqs"))]
mod imp {
    use listmill_core::config::SqsConfig;

    use crate::error::QueueError;

    /// Stub that fails construction when the `queue-sqs` feature is off.
    pub struct SqsQueue;

    impl SqsQueue {
        pub async fn new(_config: &SqsConfig) -> Result<Self, QueueError> {
            Err(QueueError::Provider(
                "SQS queue backend requires the 'queue-sqs' Cargo feature".to_string(),
            ))
        }
    }
}

#[cfg(feature = "queue-sqs")]
mod imp {
    use async_trait::async_trait;
    use aws_credential_types::Credentials;
    use aws_sdk_sqs::config::BehaviorVersion;
    use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
    use aws_sdk_sqs::Client;
    use chrono::{TimeZone, Utc};
    use tracing::{debug, info};

    use listmill_core::config::SqsConfig;

    use crate::consumer::{JobConsumer, JobProducer, QueueHealth};
    use crate::error::QueueError;
    use crate::job::{IngestionJob, JobMessage};

    /// SQS-backed job queue.
    pub struct SqsQueue {
        client: Client,
        queue_url: String,
        dlq_url: Option<String>,
        visibility_timeout_secs: i32,
    }

    impl SqsQueue {
        pub async fn new(config: &SqsConfig) -> Result<Self, QueueError> {
            let queue_url = config
                .queue_url
                .clone()
                .ok_or_else(|| QueueError::Connection("INGEST_QUEUE_URL not set".to_string()))?;

            let region = aws_sdk_sqs::config::Region::new(config.region.clone());
            let mut sqs_config = aws_sdk_sqs::Config::builder()
                .region(region)
                .behavior_version(BehaviorVersion::latest());

            // Static credentials for local dev / explicit config.
            if let (Some(key_id), Some(secret)) =
                (&config.access_key_id, &config.secret_access_key)
            {
                let creds = Credentials::new(
                    key_id,
                    secret,
                    config.session_token.clone(),
                    None,
                    "listmill-queue-static",
                );
                sqs_config = sqs_config.credentials_provider(creds);
            }

            if let Some(ref endpoint) = config.endpoint_url {
                if !endpoint.is_empty() {
                    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://")
                    {
                        endpoint.clone()
                    } else {
                        format!("https://{endpoint}")
                    };
                    sqs_config = sqs_config.endpoint_url(&url);
                }
            }

            let client = Client::from_conf(sqs_config.build());

            info!(
                queue_url = %queue_url,
                region = %config.region,
                "SQS queue initialized"
            );

            Ok(Self {
                client,
                queue_url,
                dlq_url: config.dlq_url.clone(),
                visibility_timeout_secs: config.visibility_timeout_secs as i32,
            })
        }
    }

    #[async_trait]
    impl JobProducer for SqsQueue {
        async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError> {
            let body = job.to_body()?;
            self.client
                .send_message()
                .queue_url(&self.queue_url)
                .message_body(body)
                .send()
                .await
                .map_err(|e| QueueError::Provider(format!("SQS send failed: {e:?}")))?;
            Ok(())
        }
    }

    #[async_trait]
    impl JobConsumer for SqsQueue {
        async fn poll(&self, max_messages: u32) -> Result<Vec<JobMessage>, QueueError> {
            // SQS caps at 10 messages per request.
            let capped = max_messages.min(10) as i32;
            debug!(max_messages = capped, "polling SQS");

            let resp = self
                .client
                .receive_message()
                .queue_url(&self.queue_url)
                .max_number_of_messages(capped)
                .wait_time_seconds(20)
                .visibility_timeout(self.visibility_timeout_secs)
                .message_system_attribute_names(MessageSystemAttributeName::All)
                .send()
                .await
                .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

            let sqs_messages = resp.messages.unwrap_or_default();
            let mut messages = Vec::with_capacity(sqs_messages.len());
            for msg in sqs_messages {
                let id = msg.message_id().unwrap_or("unknown").to_string();
                let body = msg.body().unwrap_or("").to_string();
                let receipt_handle = msg
                    .receipt_handle()
                    .ok_or_else(|| QueueError::Parse("missing receipt handle".into()))?
                    .to_string();

                let enqueued_at = msg
                    .attributes()
                    .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
                    .and_then(|ts| ts.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .unwrap_or_else(Utc::now);

                let attempt_count = msg
                    .attributes()
                    .and_then(|attrs| {
                        attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount)
                    })
                    .and_then(|c| c.parse::<u32>().ok())
                    .unwrap_or(1);

                messages.push(JobMessage {
                    id,
                    body,
                    receipt_handle,
                    enqueued_at,
                    attempt_count,
                });
            }

            Ok(messages)
        }

        async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
            self.client
                .delete_message()
                .queue_url(&self.queue_url)
                .receipt_handle(receipt_handle)
                .send()
                .await
                .map_err(|e| QueueError::Ack(format!("SQS delete failed: {e:?}")))?;
            Ok(())
        }

        async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
            // Visibility 0 makes the message immediately redeliverable.
            self.client
                .change_message_visibility()
                .queue_url(&self.queue_url)
                .receipt_handle(receipt_handle)
                .visibility_timeout(0)
                .send()
                .await
                .map_err(|e| QueueError::Provider(format!("SQS visibility change failed: {e:?}")))?;
            Ok(())
        }

        async fn health_check(&self) -> Result<QueueHealth, QueueError> {
            let resp = self
                .client
                .get_queue_attributes()
                .queue_url(&self.queue_url)
                .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
                .send()
                .await
                .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

            let count = resp
                .attributes()
                .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
                .and_then(|v| v.parse::<u64>().ok());

            Ok(QueueHealth {
                connected: true,
                approximate_message_count: count,
                provider: "sqs".to_string(),
            })
        }

        async fn dead_letter_depth(&self) -> Result<Option<u64>, QueueError> {
            let dlq_url = match &self.dlq_url {
                Some(url) => url,
                None => return Ok(None),
            };

            let resp = self
                .client
                .get_queue_attributes()
                .queue_url(dlq_url)
                .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
                .send()
                .await
                .map_err(|e| QueueError::Connection(format!("SQS DLQ check failed: {e:?}")))?;

            let count = resp
                .attributes()
                .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
                .and_then(|v| v.parse::<u64>().ok());

            Ok(count)
        }
    }
}

pub use imp::SqsQueue;

#[cfg(all(test, not(feature = "queue-sqs")))]
mod tests {
    use super::*;
    use listmill_core::config::SqsConfig;

    fn config() -> SqsConfig {
        SqsConfig {
            region: "ap-northeast-2".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            queue_url: Some("https://sqs.example/queue".to_string()),
            dlq_url: None,
            visibility_timeout_secs: 120,
            endpoint_url: None,
        }
    }

    #[tokio::test]
    async fn test_stub_bails_without_feature() {
        let err = SqsQueue::new(&config()).await.err().expect("stub must fail");
        assert!(err.to_string().contains("queue-sqs"));
    }
}
