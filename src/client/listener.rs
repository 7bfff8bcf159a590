use std::sync::mpsc::Sender;

/// Application side of the client: told about unsolicited server pushes.
///
/// Called from the listen loop thread (or from a download waiting for its
/// reply), never while a client lock is held.
pub trait ClientListener: Send + Sync {
    /// The coordinator ended the exam.
    fn on_test_over(&self);

    /// The coordinator published a file; fetch it with `request_download`.
    fn on_file_available(&self);
}

#[derive(Debug, Clone, Default)]
pub struct NoopClientListener;

impl ClientListener for NoopClientListener {
    fn on_test_over(&self) {}
    fn on_file_available(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    TestOver,
    FileAvailable,
}

impl ClientListener for Sender<ClientEvent> {
    fn on_test_over(&self) {
        let _ = self.send(ClientEvent::TestOver);
    }

    fn on_file_available(&self) {
        let _ = self.send(ClientEvent::FileAvailable);
    }
}
