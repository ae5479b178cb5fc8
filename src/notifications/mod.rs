// Per-user notification list and its session-scoped service

pub mod model;
pub mod service;
pub mod store;

pub use model::{NewNotification, Notification, NotificationKind, Priority};
pub use service::{maybe_simulate, NotificationService, SimulationConfig};
pub use store::{storage_key, Listener, NotificationStore, Subscribers, SubscriptionId};
