// 📬 Notification Store - per-user list, persisted whole on every change
//
// Newest first. Each mutation writes the full list to storage, then fans
// the new list out to every subscriber.

use crate::notifications::model::{NewNotification, Notification};
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

pub type Listener = Arc<dyn Fn(&[Notification]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered change listeners, keyed by subscription
#[derive(Default)]
pub struct Subscribers {
    entries: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl Subscribers {
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&[Notification]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| *sid != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cloned handles, so callers can release their lock before invoking
    pub fn listeners(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub fn notify(&self, items: &[Notification]) {
        for (_, listener) in &self.entries {
            listener(items);
        }
    }
}

pub struct NotificationStore<K> {
    user_id: String,
    storage: K,
    items: Vec<Notification>,
    subscribers: Subscribers,
    revision: u64,
}

pub fn storage_key(user_id: &str) -> String {
    format!("notifications_{}", user_id)
}

impl<K: KeyValueStore> NotificationStore<K> {
    /// Load the user's saved list; unreadable data starts an empty list
    pub fn load(user_id: &str, storage: K) -> Result<Self> {
        let key = storage_key(user_id);
        let items = match storage.get(&key)? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!(user_id, error = %err, "discarding unreadable notification list");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(NotificationStore {
            user_id: user_id.to_string(),
            storage,
            items,
            subscribers: Subscribers::default(),
            revision: 0,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn list(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Bumped by every saved change since load
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add(&mut self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            kind: new.kind,
            title: new.title,
            message: new.message,
            timestamp: Utc::now(),
            read: false,
            priority: new.priority,
        };

        let mut next = Vec::with_capacity(self.items.len() + 1);
        next.push(notification.clone());
        next.extend(self.items.iter().cloned());
        self.commit(next)?;
        debug!(user_id = %self.user_id, id = %notification.id, "notification added");
        Ok(notification)
    }

    /// Returns false when the id is unknown or already read
    pub fn mark_as_read(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.items.iter().position(|n| n.id == id && !n.read) else {
            return Ok(false);
        };
        let mut next = self.items.clone();
        next[index].read = true;
        self.commit(next)?;
        Ok(true)
    }

    pub fn mark_all_as_read(&mut self) -> Result<usize> {
        let changed = self.unread_count();
        if changed == 0 {
            return Ok(0);
        }
        let next = self
            .items
            .iter()
            .cloned()
            .map(|mut n| {
                n.read = true;
                n
            })
            .collect();
        self.commit(next)?;
        Ok(changed)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if !self.items.iter().any(|n| n.id == id) {
            return Ok(false);
        }
        let next = self.items.iter().filter(|n| n.id != id).cloned().collect();
        self.commit(next)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.storage
            .remove(&storage_key(&self.user_id))
            .context("Failed to clear notifications")?;
        self.items.clear();
        self.revision += 1;
        self.subscribers.notify(&self.items);
        Ok(())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&[Notification]) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Persist `next`; memory only moves once storage has it
    fn commit(&mut self, next: Vec<Notification>) -> Result<()> {
        let json = serde_json::to_string(&next)?;
        self.storage
            .set(&storage_key(&self.user_id), &json)
            .context("Failed to persist notifications")?;
        self.items = next;
        self.revision += 1;
        self.subscribers.notify(&self.items);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
