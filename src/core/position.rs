//! Position source capability.
//!
//! The platform binding (foreground watcher, background task, or a test
//! script) implements [`PositionSource`]; the monitoring session only sees a
//! stream of samples and never knows which delivery mechanism is active.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::model::{PermissionStatus, PositionSample};

/// Interval/distance filter for position updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscribeOptions {
    /// Minimum time between delivered samples.
    pub min_interval: Duration,
    /// Minimum movement between delivered samples.
    pub min_distance_meters: f64,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        // Battery-friendly profile: a fix every 10s or every 50m.
        Self {
            min_interval: Duration::from_secs(10),
            min_distance_meters: 50.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("location permission not granted")]
    PermissionDenied,
    #[error("position source unavailable: {0}")]
    Unavailable(String),
}

/// A live stream of position samples.
///
/// Dropping the subscription releases the underlying platform watch; the
/// source observes the closed channel and stops delivering.
pub struct PositionSubscription {
    receiver: mpsc::Receiver<PositionSample>,
}

impl PositionSubscription {
    pub fn new(receiver: mpsc::Receiver<PositionSample>) -> Self {
        Self { receiver }
    }

    /// Next sample, or `None` once the source has shut down.
    pub async fn next_sample(&mut self) -> Option<PositionSample> {
        self.receiver.recv().await
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Request foreground and background location permission.
    ///
    /// `Granted` means both were granted; a missing background grant is a
    /// denial, since arrival alarms are useless without it.
    async fn request_permission(&self) -> PermissionStatus;

    /// Begin delivering samples under the given interval/distance filter.
    async fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> Result<PositionSubscription, PositionError>;

    /// One-shot fix outside any subscription, if a fix is obtainable.
    async fn current_position(&self) -> Option<PositionSample>;
}
