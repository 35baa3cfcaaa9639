//! User-facing notifications for conditions the mini-app cannot recover from
//! on its own (no host bridge, unexpected install failure).

use tracing::error;

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Surfaces notifications as error logs.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        error!(notification = message, "minikit: user notification");
    }
}
