use log::{error, info, warn};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-visible notification (a toast, in a graphical front end)
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: &str) -> Self {
        Notice { level: NoticeLevel::Info, text: text.to_string() }
    }

    pub fn success(text: &str) -> Self {
        Notice { level: NoticeLevel::Success, text: text.to_string() }
    }

    pub fn error(text: &str) -> Self {
        Notice { level: NoticeLevel::Error, text: text.to_string() }
    }
}

/// Sink for notifications shown to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.text),
            NoticeLevel::Error => error!("{}", notice.text),
        }
    }
}

/// Forwards notices to a presentation layer over a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notice>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelNotifier { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Don't block on sending - a full or closed channel just drops the notice
        if let Err(e) = self.tx.try_send(notice) {
            warn!("Dropped notification: {}", e);
        }
    }
}
