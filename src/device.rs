// 📱 Device Capabilities - clipboard, haptics, system alerts
// Injected so the PIN and notification flows run without a real device

use crate::notifications::Notification;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticPattern {
    /// Short tick on each accepted digit
    Tap,
    /// Double pulse on a rejected PIN
    Error,
    Success,
}

pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> Option<String>;
}

pub trait Haptics: Send + Sync {
    fn vibrate(&self, pattern: HapticPattern);
}

/// OS-level notification surface (banner, lock screen, ...)
pub trait SystemNotifier: Send + Sync {
    fn permission_granted(&self) -> bool;
    fn request_permission(&self) -> bool;
    fn present(&self, notification: &Notification);
}

/// Fallback for every capability: does nothing, grants nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDevice;

impl Clipboard for NoopDevice {
    fn read_text(&self) -> Option<String> {
        None
    }
}

impl Haptics for NoopDevice {
    fn vibrate(&self, _pattern: HapticPattern) {}
}

impl SystemNotifier for NoopDevice {
    fn permission_granted(&self) -> bool {
        false
    }

    fn request_permission(&self) -> bool {
        false
    }

    fn present(&self, _notification: &Notification) {}
}

#[derive(Clone)]
pub struct Capabilities {
    pub clipboard: Arc<dyn Clipboard>,
    pub haptics: Arc<dyn Haptics>,
    pub notifier: Arc<dyn SystemNotifier>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            clipboard: Arc::new(NoopDevice),
            haptics: Arc::new(NoopDevice),
            notifier: Arc::new(NoopDevice),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
