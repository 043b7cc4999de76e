//! Terminal stand-ins for the router and the toast surface.

use parking_lot::Mutex;
use shepherd::{NavigateOptions, Navigator, Notification, NotificationSink, NotificationVariant};
use tracing::{error, info, warn};

/// Router that only tracks the current path and logs navigations.
pub struct LogNavigator {
    path: Mutex<String>,
}

impl LogNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            path: Mutex::new(initial_path.into()),
        }
    }
}

impl Navigator for LogNavigator {
    fn current_path(&self) -> String {
        self.path.lock().clone()
    }

    fn go_to(&self, path: &str, options: NavigateOptions) {
        let mut current = self.path.lock();
        info!(from = %current, to = %path, replace = options.replace, "Navigating");
        *current = path.to_string();
    }
}

/// Toasts rendered as log lines at a level matching their weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            title, description, ..
        } = &notification;
        match notification.variant {
            NotificationVariant::Default => info!(title = %title, "{description}"),
            NotificationVariant::Warning => warn!(title = %title, "{description}"),
            NotificationVariant::Destructive => error!(title = %title, "{description}"),
        }
    }
}
