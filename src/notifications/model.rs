// 🔔 Notification Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Transaction,
    System,
    Security,
    Promotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub priority: Priority,
}

/// Caller-supplied part of a notification; the store assigns the rest
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: &str, message: &str, priority: Priority) -> Self {
        NewNotification {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            priority,
        }
    }

    pub fn login(device: &str) -> Self {
        Self::new(
            NotificationKind::Security,
            "New login",
            &format!("Your account was accessed from {}.", device),
            Priority::Medium,
        )
    }

    pub fn deposit(amount: f64, currency: &str) -> Self {
        Self::new(
            NotificationKind::Transaction,
            "Deposit received",
            &format!("{} {:.2} has been added to your wallet.", currency, amount),
            Priority::Medium,
        )
    }

    pub fn transaction_succeeded(amount: f64, currency: &str, recipient: &str) -> Self {
        Self::new(
            NotificationKind::Transaction,
            "Transfer sent",
            &format!("{} {:.2} is on its way to {}.", currency, amount, recipient),
            Priority::Medium,
        )
    }

    pub fn transaction_failed(recipient: &str, reason: &str) -> Self {
        Self::new(
            NotificationKind::Transaction,
            "Transfer failed",
            &format!("Your transfer to {} failed: {}", recipient, reason),
            Priority::High,
        )
    }

    /// Stand-in for a server push until a real-time channel exists
    pub fn simulated_security_alert() -> Self {
        Self::new(
            NotificationKind::Security,
            "Security check",
            "We noticed a sign-in attempt on your account. If this wasn't you, change your PIN.",
            Priority::High,
        )
    }
}
