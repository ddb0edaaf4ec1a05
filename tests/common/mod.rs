//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;

use ldn_outbox::config::LocalServiceConfig;
use ldn_outbox::delivery::{DeliveryClient, DeliveryError};
use ldn_outbox::message::{
    InMemoryEndpointRegistry, InMemoryResourceStore, Resource, ServiceEndpoint, TriggerEvent,
    TriggerRule,
};
use ldn_outbox::notification::{NotificationBuilder, PatternStore};
use ldn_outbox::queue::{QueueManager, TimeoutReaper};
use ldn_outbox::store::MemoryMessageStore;

pub const REVIEW_INBOX: &str = "https://review.example.org/inbox";
pub const TIMEOUT_MINUTES: i64 = 60;
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

/// Delivery client answering with a configurable status.
///
/// With `hold()` enabled each POST signals `entered` and waits for
/// `release` before answering.
#[derive(Default)]
pub struct FakeInbox {
    status: AtomicU16,
    posts: Mutex<Vec<RecordedPost>>,
    hold: Mutex<bool>,
    pub entered: Notify,
    pub release: Notify,
}

impl FakeInbox {
    pub fn answering(status: u16) -> Arc<Self> {
        let inbox = Self::default();
        inbox.status.store(status, Ordering::SeqCst);
        Arc::new(inbox)
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        *self.hold.lock().unwrap() = true;
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for FakeInbox {
    async fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<u16, DeliveryError> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            body: body.to_string(),
            headers: headers.to_vec(),
        });

        let held = *self.hold.lock().unwrap();
        if held {
            self.entered.notify_one();
            self.release.notified().await;
        }

        let status = self.status.load(Ordering::SeqCst);
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(DeliveryError::Status(status))
        }
    }
}

pub fn local_service() -> LocalServiceConfig {
    LocalServiceConfig {
        ui_url: Some("https://repo.example.org".to_string()),
        inbox_url: Some("https://repo.example.org/ldn/inbox".to_string()),
        name: "Example Repository".to_string(),
    }
}

pub fn review_endpoint() -> ServiceEndpoint {
    ServiceEndpoint::new("review", "Review Service", "https://review.example.org")
        .with_inbox(REVIEW_INBOX)
        .with_resolver("https://doi.org")
        .with_shared_secret("X-Api-Key", "review-secret")
}

pub fn titled(id: &str, title: &str) -> Resource {
    Resource::new(id)
        .with_handle(format!("123456789/{}", id))
        .with_metadata("dc.title", title)
}

pub struct Harness {
    pub store: Arc<MemoryMessageStore>,
    pub resources: Arc<InMemoryResourceStore>,
    pub endpoints: Arc<InMemoryEndpointRegistry>,
    pub inbox: Arc<FakeInbox>,
    pub manager: Arc<QueueManager>,
    pub reaper: TimeoutReaper,
}

impl Harness {
    pub fn new(inbox: Arc<FakeInbox>) -> Self {
        Self::with_delivery(inbox.clone(), inbox)
    }

    pub fn with_delivery(inbox: Arc<FakeInbox>, delivery: Arc<dyn DeliveryClient>) -> Self {
        Self::build(inbox, delivery, Duration::minutes(TIMEOUT_MINUTES))
    }

    pub fn with_timeout(inbox: Arc<FakeInbox>, timeout: Duration) -> Self {
        Self::build(inbox.clone(), inbox, timeout)
    }

    fn build(inbox: Arc<FakeInbox>, delivery: Arc<dyn DeliveryClient>, timeout: Duration) -> Self {
        let store = Arc::new(MemoryMessageStore::new());
        let resources = Arc::new(InMemoryResourceStore::new());
        let endpoints = Arc::new(InMemoryEndpointRegistry::from_endpoints(vec![
            review_endpoint(),
        ]));
        let builder = Arc::new(NotificationBuilder::new(
            local_service(),
            Arc::new(PatternStore::with_defaults()),
        ));

        let manager = Arc::new(QueueManager::new(
            store.clone(),
            builder,
            delivery,
            resources.clone(),
            endpoints.clone(),
            timeout,
        ));
        let reaper = TimeoutReaper::new(store.clone(), MAX_ATTEMPTS);

        Self {
            store,
            resources,
            endpoints,
            inbox,
            manager,
            reaper,
        }
    }

    /// Register a titled resource and enqueue one `pattern` message for it.
    pub async fn enqueue_one(&self, resource_id: &str, pattern: &str) -> String {
        self.resources.insert(titled(resource_id, "A titled item"));
        let event = TriggerEvent::new(
            resource_id,
            vec![TriggerRule::new(resource_id, "review", pattern)],
        );
        let report = self.manager.enqueue(&event).await.unwrap();
        assert_eq!(report.queued.len(), 1, "skipped: {:?}", report.skipped);
        report.queued[0].id.clone()
    }
}

/// A point past the timeout of a claim made at `claimed_at`
pub fn after_timeout(claimed_at: DateTime<Utc>) -> DateTime<Utc> {
    claimed_at + Duration::minutes(TIMEOUT_MINUTES) + Duration::seconds(1)
}
