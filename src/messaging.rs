//! Domain event publishing over NATS.
//!
//! Publishing is best effort: a missing client or a failed publish is logged
//! and never fails the request that produced the event.

use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "storefront";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self { nats: None } }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, event: &DomainEvent) {
        let subject = format!("{SUBJECT_PREFIX}.{}", event.subject());
        let Some(client) = &self.nats else {
            tracing::debug!(%subject, "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%subject, %error, "failed to serialize event");
                return;
            }
        };
        if let Err(error) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, %error, "failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events {
            self.publish(event).await;
        }
    }
}

/// Connects to NATS when a URL is configured; connection failures disable publishing.
pub async fn connect(url: Option<&str>) -> EventPublisher {
    let Some(url) = url else { return EventPublisher::disabled() };
    match async_nats::connect(url).await {
        Ok(client) => {
            tracing::info!(%url, "connected to NATS");
            EventPublisher::new(Some(client))
        }
        Err(error) => {
            tracing::warn!(%url, %error, "NATS unavailable, events will not be published");
            EventPublisher::disabled()
        }
    }
}
