//! Alert dispatch boundary.
//!
//! Actual delivery (SMTP, webhooks, chat) belongs to the notification
//! service; the engine only hands a finished alert to a [`Notifier`] per
//! channel and records the outcome. Delivery failures are recorded on the
//! notification, never bubbled into alert state.

use std::sync::Mutex;

use tracing::info;
use tw_common::Result;

use crate::schema::{Alert, ChannelConfig};

/// Delivers one alert over one channel.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, alert: &Alert, channel: &ChannelConfig) -> Result<()>;
}

/// Notifier that only logs; the default when no delivery backend is wired.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, alert: &Alert, channel: &ChannelConfig) -> Result<()> {
        info!(
            alert_id = %alert.alert_id,
            model = %alert.model,
            severity = %alert.severity,
            channel = ?channel.channel_type,
            target = %channel.target,
            "alert dispatched"
        );
        Ok(())
    }
}

/// Test notifier that records every dispatch and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    dispatched: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        RecordingNotifier {
            fail: true,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// (alert_id, target) pairs in dispatch order.
    pub fn dispatched(&self) -> Vec<(String, String)> {
        match self.dispatched.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, alert: &Alert, channel: &ChannelConfig) -> Result<()> {
        if self.fail {
            return Err(tw_common::Error::Dispatch {
                channel: format!("{:?}", channel.channel_type),
                reason: "simulated delivery failure".to_string(),
            });
        }
        let mut dispatched = match self.dispatched.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        dispatched.push((alert.alert_id.clone(), channel.target.clone()));
        Ok(())
    }
}
