//! Handlers shared by the pub/sub tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relaybus::{BoxError, Message, MessageHandler};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Forwards every delivered message to a channel; `cancel` can be made to fail.
pub struct TestHandler {
    tx: Mutex<Sender<Message>>,
    fail_cancel: bool,
    cancels: AtomicUsize,
}

impl TestHandler {
    pub fn new() -> (Arc<Self>, Receiver<Message>) {
        Self::build(false)
    }

    pub fn failing_cancel() -> (Arc<Self>, Receiver<Message>) {
        Self::build(true)
    }

    fn build(fail_cancel: bool) -> (Arc<Self>, Receiver<Message>) {
        let (tx, rx) = channel();
        let handler = Arc::new(Self {
            tx: Mutex::new(tx),
            fail_cancel,
            cancels: AtomicUsize::new(0),
        });
        (handler, rx)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl MessageHandler for TestHandler {
    fn handle(&self, msg: &Message) -> Result<(), BoxError> {
        self.tx
            .lock()
            .map_err(|_| "handler poisoned")?
            .send(msg.clone())
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn cancel(&self) -> Result<(), BoxError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.fail_cancel {
            Err("failed".into())
        } else {
            Ok(())
        }
    }
}

/// A telemetry message as a protocol adapter would publish it.
pub fn telemetry(channel: &str, subtopic: &str, payload: &str) -> Message {
    Message::new(channel, payload)
        .with_subtopic(subtopic)
        .with_publisher("thing-1")
        .with_protocol("mqtt")
}
