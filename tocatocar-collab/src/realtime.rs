use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::CollabEvent;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Relay responded with status {0}")]
    Status(u16),
    #[error("Publisher is closed")]
    Closed,
}

/// Something that fans events out to connected clients
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: &Value)
        -> Result<(), PublishError>;
}

/// When committed events are published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Publishes are awaited before the operation returns
    #[default]
    Inline,
    /// Publishes happen on a spawned task
    Deferred,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "deferred" => Ok(Self::Deferred),
            other => Err(format!("Unknown dispatch mode \"{}\"", other)),
        }
    }
}

/// Publishes post-commit events to every registered publisher.
/// Failures are logged and never reach the caller.
#[derive(Default)]
pub struct Dispatcher {
    mode: DispatchMode,
    publishers: RwLock<Vec<Arc<dyn Publisher>>>,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            publishers: Default::default(),
        }
    }

    pub fn register(&self, publisher: Arc<dyn Publisher>) {
        self.publishers.write().push(publisher);
    }

    pub async fn dispatch(&self, events: Vec<CollabEvent>) {
        if events.is_empty() {
            return;
        }

        let publishers = self.publishers.read().clone();

        match self.mode {
            DispatchMode::Inline => publish_all(publishers, events).await,
            DispatchMode::Deferred => {
                tokio::spawn(publish_all(publishers, events));
            }
        }
    }
}

async fn publish_all(publishers: Vec<Arc<dyn Publisher>>, events: Vec<CollabEvent>) {
    for event in events {
        let channel = event.channel();
        let payload = event.payload();

        for publisher in &publishers {
            match publisher.publish(&channel, event.name(), &payload).await {
                Ok(_) => debug!("Published {} on {}", event.name(), channel),
                Err(e) => warn!("Failed to publish {} on {}: {}", event.name(), channel, e),
            }
        }
    }
}

/// Relays events to a hosted pub/sub service over HTTP
pub struct HttpPublisher {
    client: Client,
    url: String,
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RelayBody<'a> {
    channel: &'a str,
    event: &'a str,
    data: &'a Value,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>, key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            key,
        }
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let mut request = self.client.post(&self.url).json(&RelayBody {
            channel,
            event,
            data: payload,
        });

        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use parking_lot::Mutex;

    use super::*;

    /// Records everything it is asked to publish, and optionally fails every time
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        failing: bool,
        published: Mutex<Vec<(String, String, Value)>>,
    }

    impl RecordingPublisher {
        pub(crate) fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub(crate) fn published(&self) -> Vec<(String, String, Value)> {
            self.published.lock().clone()
        }

        pub(crate) fn count(&self, channel: &str, event: &str) -> usize {
            self.published
                .lock()
                .iter()
                .filter(|(c, e, _)| c == channel && e == event)
                .count()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            channel: &str,
            event: &str,
            payload: &Value,
        ) -> Result<(), PublishError> {
            self.published
                .lock()
                .push((channel.to_string(), event.to_string(), payload.clone()));

            if self.failing {
                return Err(PublishError::Closed);
            }

            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_publisher_does_not_stop_others() {
        let dispatcher = Dispatcher::new(DispatchMode::Inline);
        let failing = Arc::new(RecordingPublisher::failing());
        let recording = Arc::new(RecordingPublisher::default());

        dispatcher.register(failing.clone());
        dispatcher.register(recording.clone());

        dispatcher
            .dispatch(vec![
                CollabEvent::JamUpdated { jam_id: 1 },
                CollabEvent::JamUpdated { jam_id: 2 },
            ])
            .await;

        assert_eq!(failing.published().len(), 2);
        assert_eq!(recording.count("jam-1", "update-jam"), 1);
        assert_eq!(recording.count("jam-2", "update-jam"), 1);
    }

    #[test]
    fn test_dispatch_mode_from_str() {
        assert_eq!("Deferred".parse::<DispatchMode>(), Ok(DispatchMode::Deferred));
        assert_eq!(" inline ".parse::<DispatchMode>(), Ok(DispatchMode::Inline));
        assert!("later".parse::<DispatchMode>().is_err());
    }
}
