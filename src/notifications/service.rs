// 🛰️ Notification Service - session-scoped owner of the store
// init() on login, dispose() on logout; the simulated push timer dies with it

use crate::device::SystemNotifier;
use crate::notifications::model::{NewNotification, Notification, Priority};
use crate::notifications::store::{NotificationStore, Subscribers, SubscriptionId};
use crate::storage::KeyValueStore;
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub interval: Duration,
    /// Chance per tick of synthesizing a security notification
    pub probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            interval: Duration::from_secs(30),
            probability: 0.05,
        }
    }
}

/// One simulation tick: with `probability`, add a security notification
pub fn maybe_simulate<K: KeyValueStore, R: Rng>(
    store: &mut NotificationStore<K>,
    rng: &mut R,
    probability: f64,
) -> Result<Option<Notification>> {
    if !rng.gen_bool(probability.clamp(0.0, 1.0)) {
        return Ok(None);
    }
    store
        .add(NewNotification::simulated_security_alert())
        .map(Some)
}

fn present_if_urgent(notifier: &dyn SystemNotifier, notification: &Notification) {
    if notification.priority == Priority::High && notifier.permission_granted() {
        notifier.present(notification);
    }
}

/// Call every listener with no lock held, so listeners may read the service back
fn publish(subscribers: &Mutex<Subscribers>, items: &[Notification]) {
    let listeners = match subscribers.lock() {
        Ok(subscribers) => subscribers.listeners(),
        Err(_) => {
            warn!("notification subscribers lock poisoned");
            return;
        }
    };
    for listener in listeners {
        listener(items);
    }
}

pub struct NotificationService<K> {
    store: Arc<Mutex<NotificationStore<K>>>,
    subscribers: Arc<Mutex<Subscribers>>,
    notifier: Arc<dyn SystemNotifier>,
    simulation: Option<JoinHandle<()>>,
}

impl<K: KeyValueStore + 'static> NotificationService<K> {
    pub fn init(user_id: &str, storage: K, notifier: Arc<dyn SystemNotifier>) -> Result<Self> {
        let store = NotificationStore::load(user_id, storage)?;
        info!(user_id, saved = store.list().len(), "notification service started");

        if !notifier.permission_granted() {
            let granted = notifier.request_permission();
            debug!(granted, "system notification permission requested");
        }

        Ok(NotificationService {
            store: Arc::new(Mutex::new(store)),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            notifier,
            simulation: None,
        })
    }

    /// Start the simulated push check. Must run inside a tokio runtime.
    pub fn start_simulation(&mut self, config: SimulationConfig) {
        if self.simulation.is_some() {
            return;
        }

        let store = Arc::clone(&self.store);
        let subscribers = Arc::clone(&self.subscribers);
        let notifier = Arc::clone(&self.notifier);
        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let start = tokio::time::Instant::now() + config.interval;
            let mut ticker = tokio::time::interval_at(start, config.interval);

            loop {
                ticker.tick().await;

                let added = match store.lock() {
                    Ok(mut guard) => maybe_simulate(&mut *guard, &mut rng, config.probability)
                        .map(|added| added.map(|n| (n, guard.list().to_vec()))),
                    Err(_) => {
                        warn!("notification store lock poisoned; stopping simulation");
                        break;
                    }
                };

                match added {
                    Ok(Some((notification, items))) => {
                        debug!(id = %notification.id, "simulated security notification");
                        publish(&subscribers, &items);
                        present_if_urgent(notifier.as_ref(), &notification);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "simulated notification not saved"),
                }
            }
        });

        self.simulation = Some(handle);
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation.is_some()
    }

    /// End of session: stop timers and drop subscribers
    pub fn dispose(mut self) {
        self.stop_simulation();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            *subscribers = Subscribers::default();
        }
        if let Ok(guard) = self.store.lock() {
            info!(user_id = guard.user_id(), "notification service disposed");
        }
    }

    fn stop_simulation(&mut self) {
        if let Some(handle) = self.simulation.take() {
            handle.abort();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, NotificationStore<K>>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("notification store lock poisoned"))
    }

    /// Run `op` under the store lock, then tell subscribers if the list moved
    fn mutate<T>(&self, op: impl FnOnce(&mut NotificationStore<K>) -> Result<T>) -> Result<T> {
        let (value, changed) = {
            let mut store = self.lock()?;
            let before = store.revision();
            let value = op(&mut *store)?;
            let changed = (store.revision() != before).then(|| store.list().to_vec());
            (value, changed)
        };

        if let Some(items) = changed {
            publish(&self.subscribers, &items);
        }
        Ok(value)
    }

    pub fn add(&self, new: NewNotification) -> Result<Notification> {
        let notification = self.mutate(|store| store.add(new))?;
        present_if_urgent(self.notifier.as_ref(), &notification);
        Ok(notification)
    }

    pub fn notify_login(&self, device: &str) -> Result<Notification> {
        self.add(NewNotification::login(device))
    }

    pub fn notify_deposit(&self, amount: f64, currency: &str) -> Result<Notification> {
        self.add(NewNotification::deposit(amount, currency))
    }

    pub fn notify_transaction_succeeded(
        &self,
        amount: f64,
        currency: &str,
        recipient: &str,
    ) -> Result<Notification> {
        self.add(NewNotification::transaction_succeeded(amount, currency, recipient))
    }

    pub fn notify_transaction_failed(&self, recipient: &str, reason: &str) -> Result<Notification> {
        self.add(NewNotification::transaction_failed(recipient, reason))
    }

    pub fn mark_as_read(&self, id: &str) -> Result<bool> {
        self.mutate(|store| store.mark_as_read(id))
    }

    pub fn mark_all_as_read(&self) -> Result<usize> {
        self.mutate(|store| store.mark_all_as_read())
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.mutate(|store| store.delete(id))
    }

    pub fn clear(&self) -> Result<()> {
        self.mutate(|store| store.clear())
    }

    pub fn snapshot(&self) -> Result<Vec<Notification>> {
        Ok(self.lock()?.list().to_vec())
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(self.lock()?.unread_count())
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Notification]) + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| anyhow!("notification subscribers lock poisoned"))?;
        Ok(subscribers.subscribe(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| anyhow!("notification subscribers lock poisoned"))?;
        Ok(subscribers.unsubscribe(id))
    }
}

impl<K> Drop for NotificationService<K> {
    fn drop(&mut self) {
        if let Some(handle) = self.simulation.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
