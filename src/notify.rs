use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Ms;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    BookingConfirmation,
    LessonReminder,
    CancellationNotice,
}

/// A request for the external mailer to send something later. The engine
/// only enqueues intents; it never renders or delivers mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub student_id: Ulid,
    pub kind: TemplateKind,
    pub send_at: Ms,
}

/// Fire-and-forget notification collaborator.
pub trait Notifier: Send + Sync {
    fn enqueue(&self, intent: NotificationIntent);
}

/// Broadcast-backed hub: the external job runner subscribes, the engine
/// publishes. Intents enqueued with no subscriber are dropped — the engine
/// never blocks on delivery.
pub struct NotifyHub {
    tx: broadcast::Sender<NotificationIntent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationIntent> {
        self.tx.subscribe()
    }
}

impl Notifier for NotifyHub {
    fn enqueue(&self, intent: NotificationIntent) {
        let _ = self.tx.send(intent);
    }
}
