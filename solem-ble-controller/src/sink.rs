//! Receivers for asynchronous status frames
//!
//! A sink is called from inside the session's notification drain. It must
//! return quickly and cannot fail; payloads are recorded, not interpreted.

use std::collections::VecDeque;

use data_encoding::HEXLOWER;

use crate::transport::Notification;

pub trait NotificationSink {
    fn on_notification(&mut self, handle: u16, data: &[u8]);
}

impl<S: NotificationSink + ?Sized> NotificationSink for &mut S {
    fn on_notification(&mut self, handle: u16, data: &[u8]) {
        (**self).on_notification(handle, data)
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn on_notification(&mut self, handle: u16, data: &[u8]) {
        (**self).on_notification(handle, data)
    }
}

/// Logs every notification as hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn on_notification(&mut self, handle: u16, data: &[u8]) {
        tracing::info!(
            handle = format_args!("0x{handle:04x}"),
            len = data.len(),
            data = %HEXLOWER.encode(data),
            "notification"
        );
    }
}

/// Keeps the most recent notifications in memory.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    capacity: usize,
    received: VecDeque<Notification>,
    dropped: usize,
}

impl RecordingSink {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            received: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.received.iter()
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }

    /// Number of notifications evicted because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn take(&mut self) -> Vec<Notification> {
        self.received.drain(..).collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl NotificationSink for RecordingSink {
    fn on_notification(&mut self, handle: u16, data: &[u8]) {
        if self.received.len() == self.capacity {
            self.received.pop_front();
            self.dropped += 1;
        }
        self.received.push_back(Notification {
            handle,
            value: data.to_vec(),
        });
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(u16, &[u8])> NotificationSink for FnSink<F> {
    fn on_notification(&mut self, handle: u16, data: &[u8]) {
        (self.0)(handle, data)
    }
}
