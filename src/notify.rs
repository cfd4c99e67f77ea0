//! One-shot surfacing of store errors and successes.
//!
//! A relay watches one store. Whenever `error` or `success` becomes set it
//! takes the message out of the store and hands a [`Notification`] to its
//! [`Notifier`], so the same message is never shown twice and an identical message
//! set later is shown again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

use crate::observability::metrics::Metrics;
use crate::store::resource::ResourceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub source: &'static str,
    pub level: Level,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no subscriber is listening")]
    NoSubscribers,

    #[error("notifier failed: {0}")]
    Failed(String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.level {
            Level::Success => info!(
                source = notification.source,
                text = %notification.message,
                "notification"
            ),
            Level::Error => error!(
                source = notification.source,
                text = %notification.message,
                "notification"
            ),
        }
        Ok(())
    }
}

/// Fans notifications out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Subscriber view that skips over notifications lost to lag.
    pub fn stream(&self) -> impl Stream<Item = Notification> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(notification) => Some(notification),
                Err(err) => {
                    warn!(error = %err, "notification subscriber lagged");
                    None
                }
            }
        })
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

/// Sends to several notifiers; succeeds if any of them did.
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut last_err = None;
        let mut delivered = false;
        for notifier in &self.notifiers {
            match notifier.notify(notification) {
                Ok(()) => delivered = true,
                Err(err) => last_err = Some(err),
            }
        }
        match (delivered, last_err) {
            (true, _) | (false, None) => Ok(()),
            (false, Some(err)) => Err(err),
        }
    }
}

/// Action run after a success has been surfaced, e.g. refreshing a list.
pub type FollowUp = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub struct NotificationRelay<T> {
    store: Arc<ResourceStore<T>>,
    notifier: Arc<dyn Notifier>,
    follow_up: Option<FollowUp>,
    metrics: Option<Metrics>,
}

impl<T> NotificationRelay<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(store: Arc<ResourceStore<T>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            follow_up: None,
            metrics: None,
        }
    }

    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = Some(follow_up);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Relays until the task is aborted or every store handle is gone.
    pub async fn run(self) {
        let mut rx = self.store.subscribe();
        debug!(store = self.store.name(), "notification relay started");

        loop {
            self.relay_pending().await;
            if rx.changed().await.is_err() {
                break;
            }
        }

        debug!(store = self.store.name(), "notification relay stopped");
    }

    /// Surfaces whatever the store currently holds. Returns what was shown.
    pub async fn relay_pending(&self) -> Vec<Notification> {
        let (error, success) = self.store.take_messages();

        let mut shown = Vec::new();
        if let Some(message) = error {
            shown.push(self.emit(Level::Error, message));
        }
        let succeeded = success.is_some();
        if let Some(message) = success {
            shown.push(self.emit(Level::Success, message));
        }

        if let Some(follow_up) = self.follow_up.as_ref().filter(|_| succeeded) {
            follow_up().await;
        }

        shown
    }

    fn emit(&self, level: Level, message: String) -> Notification {
        let notification = Notification {
            source: self.store.name(),
            level,
            message,
            at: Utc::now(),
        };

        if let Some(metrics) = &self.metrics {
            metrics
                .notifications_total
                .with_label_values(&[notification.source, level.as_str()])
                .inc();
        }

        if let Err(err) = self.notifier.notify(&notification) {
            warn!(
                source = notification.source,
                error = %err,
                "failed to deliver notification"
            );
        }

        notification
    }
}
