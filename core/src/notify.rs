/// Fire-and-forget toast/alert sink. A GUI shell points this at its own
/// notification system; failures are swallowed.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Default sink: notifications become log lines.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!("{}: {}", title, message);
    }
}
