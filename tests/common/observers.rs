#![allow(dead_code)] // Not every test binary drives the dispatcher

use async_trait::async_trait;
use parking_lot::Mutex;

use bridgesync_core::error::SyncError;
use bridgesync_core::events::DispatchObserver;
use bridgesync_core::messaging::{QueueMessage, UnwrappedMessage};

/// Records every dispatch notification for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub handled: Mutex<Vec<UnwrappedMessage>>,
    pub failed: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn handled_subjects(&self) -> Vec<String> {
        self.handled
            .lock()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }

    pub fn failed_kinds(&self) -> Vec<String> {
        self.failed
            .lock()
            .iter()
            .map(|(_, kind)| kind.clone())
            .collect()
    }
}

#[async_trait]
impl DispatchObserver for RecordingObserver {
    async fn message_handled(&self, message: &UnwrappedMessage, _raw: &QueueMessage) {
        self.handled.lock().push(message.clone());
    }

    async fn message_failed(&self, message_id: &str, error: &SyncError, _raw: &QueueMessage) {
        self.failed
            .lock()
            .push((message_id.to_string(), error.kind_name().to_string()));
    }
}
