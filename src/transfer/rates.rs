// 📈 Exchange Rate Polling - fixed-interval refresh, cancelled on drop

use crate::api::RateSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Background refresh of one currency's rate.
///
/// The first fetch happens immediately. A failed fetch keeps the last good
/// rate. Dropping the poller aborts its timer task.
pub struct RatePoller {
    currency: String,
    rx: watch::Receiver<Option<f64>>,
    handle: JoinHandle<()>,
}

impl RatePoller {
    /// Must be called from within a tokio runtime
    pub fn start<S>(source: Arc<S>, currency: impl Into<String>, every: Duration) -> Self
    where
        S: RateSource + 'static,
    {
        let currency = currency.into();
        let (tx, rx) = watch::channel(None);

        let task_currency = currency.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match source.rate(&task_currency).await {
                    Ok(rate) if rate.is_finite() && rate > 0.0 => {
                        debug!(currency = %task_currency, rate, "exchange rate refreshed");
                        if tx.send(Some(rate)).is_err() {
                            break;
                        }
                    }
                    Ok(rate) => {
                        warn!(currency = %task_currency, rate, "ignoring non-positive exchange rate");
                    }
                    Err(err) => {
                        warn!(currency = %task_currency, error = %err, "exchange rate refresh failed");
                    }
                }
            }
        });

        RatePoller { currency, rx, handle }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn latest(&self) -> Option<f64> {
        *self.rx.borrow()
    }

    /// Wait for the next published rate
    pub async fn changed(&mut self) -> Option<f64> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RatePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
