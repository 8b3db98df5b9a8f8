//! Shared test utilities for the credit desk.
//!
//! This module provides an in-memory database, a stub lookup, a recording notifier
//! and a ready-made dispatcher harness.

#![allow(clippy::unwrap_used)]

use crate::{
    config::AppConfig,
    core::{
        dispatch::Dispatcher,
        notify::{Notification, Notifier},
        payments,
    },
    entities::{self, UserId},
    errors::{Error, Result},
    lookup::{RecordLookup, VehicleRecord},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Admin configured by [`test_config`].
pub const TEST_ADMIN: UserId = 1;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Submits a pending payment with sensible defaults.
///
/// # Defaults
/// * amount: 10.0
/// * reference: `"UTR12345"`
/// * screenshot: `"screenshot-ref"`
pub async fn submit_test_payment(
    db: &DatabaseConnection,
    user_id: UserId,
) -> Result<entities::payment::Model> {
    payments::submit(
        db,
        user_id,
        10.0,
        "UTR12345".to_string(),
        "screenshot-ref".to_string(),
    )
    .await
}

/// Default configuration with [`TEST_ADMIN`] as the only admin.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        admin_ids: vec![TEST_ADMIN],
        ..AppConfig::default()
    }
}

enum StubResponse {
    Found,
    Fail(String),
    Slow(Duration),
}

/// Lookup that answers from memory and counts its calls.
pub struct StubLookup {
    response: StubResponse,
    calls: AtomicUsize,
}

impl StubLookup {
    fn with(response: StubResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every query finds a record
    #[must_use]
    pub fn found() -> Self {
        Self::with(StubResponse::Found)
    }

    /// Every query fails with `reason`
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::with(StubResponse::Fail(reason.to_string()))
    }

    /// Every query finds a record after `delay`
    #[must_use]
    pub fn slow(delay: Duration) -> Self {
        Self::with(StubResponse::Slow(delay))
    }

    /// Number of fetches so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn test_record(query: &str) -> Result<VehicleRecord> {
    VehicleRecord::from_json(
        query,
        serde_json::json!({
            "owner_name": "TEST OWNER",
            "model_name": "TEST MODEL",
            "fuel_type": "PETROL"
        }),
    )
}

#[async_trait]
impl RecordLookup for StubLookup {
    async fn fetch(&self, query: &str) -> Result<VehicleRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            StubResponse::Found => test_record(query),
            StubResponse::Fail(reason) => Err(Error::Lookup {
                reason: reason.clone(),
            }),
            StubResponse::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                test_record(query)
            }
        }
    }
}

/// Notifier that records what it sends and fails for chosen recipients.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<UserId>>,
}

impl RecordingNotifier {
    /// Notifier that fails for every id in `ids`
    pub fn failing_for(ids: impl IntoIterator<Item = UserId>) -> Self {
        let notifier = Self::default();
        for id in ids {
            notifier.fail_for(id);
        }
        notifier
    }

    /// Makes deliveries to `user_id` fail from now on
    pub fn fail_for(&self, user_id: UserId) {
        self.failing.lock().unwrap().insert(user_id);
    }

    /// Successfully delivered notifications, in order
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, notification: Notification) -> Result<()> {
        let to = notification.recipient();
        if self.failing.lock().unwrap().contains(&to) {
            return Err(Error::Delivery {
                user_id: to,
                message: "recipient unreachable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()> {
        self.record(Notification::text(to, text))
    }

    async fn send_photo(&self, to: UserId, image_ref: &str, caption: &str) -> Result<()> {
        self.record(Notification::Photo {
            to,
            image_ref: image_ref.to_string(),
            caption: caption.to_string(),
        })
    }
}

/// A dispatcher over a fresh database with handles to its collaborators.
pub struct TestHarness {
    /// The dispatcher under test
    pub dispatcher: Dispatcher,
    /// Its lookup
    pub lookup: Arc<StubLookup>,
    /// Its notifier
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    /// Harness with [`test_config`]
    pub async fn new(lookup: StubLookup) -> Result<Self> {
        Self::with_config(test_config(), lookup).await
    }

    /// Harness with a custom configuration
    pub async fn with_config(config: AppConfig, lookup: StubLookup) -> Result<Self> {
        let db = setup_test_db().await?;
        let lookup = Arc::new(lookup);
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(
            db,
            config,
            Arc::clone(&lookup) as Arc<dyn RecordLookup>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        Ok(Self {
            dispatcher,
            lookup,
            notifier,
        })
    }
}
