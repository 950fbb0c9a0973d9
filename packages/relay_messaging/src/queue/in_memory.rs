use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Notify, time::Instant};

use crate::{
    errors::{TransportError, TransportErrorKind},
    ports::{DeliveryHandle, QueueTransport, ReceivedMessage},
};

#[derive(Debug)]
struct StoredMessage {
    id: u64,
    body: String,
    receive_count: u32,
    receipt: Option<DeliveryHandle>,
    invisible_until: Option<Instant>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }

    fn is_in_flight_with(&self, handle: &DeliveryHandle, now: Instant) -> bool {
        !self.is_visible(now) && self.receipt.as_ref() == Some(handle)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    messages: VecDeque<StoredMessage>,
    acknowledged: Vec<String>,
    sent: usize,
}

/// Process-local queue with SQS delivery semantics.
///
/// Received messages stay hidden until their visibility timeout elapses or they are released. Every delivery gets a new
/// receipt handle, and only the latest handle of a message still in flight can delete it. Time is taken from
/// `tokio::time`, so a paused test clock drives redelivery.
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
    failing_sends: AtomicUsize,
    failing_receives: AtomicUsize,
    failing_acks: AtomicUsize,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            failing_sends: AtomicUsize::new(0),
            failing_receives: AtomicUsize::new(0),
            failing_acks: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // State is only mutated in short critical sections, a poisoned lock still holds consistent data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_receives(&self, count: usize) {
        self.failing_receives.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_acks(&self, count: usize) {
        self.failing_acks.store(count, Ordering::SeqCst);
    }

    /// Messages not deleted yet, visible or in flight.
    pub fn pending(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn visible(&self) -> usize {
        let now = Instant::now();
        self.lock().messages.iter().filter(|m| m.is_visible(now)).count()
    }

    pub fn pending_bodies(&self) -> Vec<String> {
        self.lock().messages.iter().map(|m| m.body.clone()).collect()
    }

    pub fn acknowledged(&self) -> usize {
        self.lock().acknowledged.len()
    }

    pub fn acknowledged_bodies(&self) -> Vec<String> {
        self.lock().acknowledged.clone()
    }

    pub fn sent(&self) -> usize {
        self.lock().sent
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }

    fn error(&self, kind: TransportErrorKind, reason: impl Into<String>) -> TransportError {
        TransportError::new(kind, &self.name, reason)
    }

    /// Delivers the first visible message, or reports when the next in-flight one becomes visible again.
    fn try_receive(&self, visibility_timeout: Duration) -> Result<ReceivedMessage, Option<Instant>> {
        let now = Instant::now();
        let mut state = self.lock();

        match state.messages.iter().position(|m| m.is_visible(now)) {
            Some(position) => {
                let message = &mut state.messages[position];
                message.receive_count += 1;
                let handle = DeliveryHandle::new(format!("{}-{}-{}", self.name, message.id, message.receive_count));
                message.receipt = Some(handle.clone());
                message.invisible_until = Some(now + visibility_timeout);

                Ok(ReceivedMessage {
                    body: message.body.clone(),
                    handle,
                })
            }
            None => Err(state.messages.iter().filter_map(|m| m.invisible_until).min()),
        }
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> Result<(), TransportError> {
        if Self::take_failure(&self.failing_sends) {
            return Err(self.error(TransportErrorKind::Send, "Injected send failure"));
        }

        {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.sent += 1;
            state.messages.push_back(StoredMessage {
                id,
                body,
                receive_count: 0,
                receipt: None,
                invisible_until: None,
            });
        }

        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive_one(&self, wait: Duration, visibility_timeout: Duration) -> Result<Option<ReceivedMessage>, TransportError> {
        if Self::take_failure(&self.failing_receives) {
            return Err(self.error(TransportErrorKind::Receive, "Injected receive failure"));
        }

        let deadline = Instant::now() + wait;

        loop {
            // Registered before looking at the queue so a send in between is not missed.
            let notified = self.notify.notified();

            let wake_at = match self.try_receive(visibility_timeout) {
                Ok(message) => return Ok(Some(message)),
                Err(Some(next_visible)) => next_visible.min(deadline),
                Err(None) => deadline,
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn acknowledge(&self, handle: &DeliveryHandle) -> Result<(), TransportError> {
        if Self::take_failure(&self.failing_acks) {
            return Err(self.error(TransportErrorKind::Acknowledge, "Injected acknowledge failure"));
        }

        let now = Instant::now();
        let mut state = self.lock();
        let position = state
            .messages
            .iter()
            .position(|m| m.is_in_flight_with(handle, now))
            .ok_or_else(|| self.error(TransportErrorKind::InvalidHandle, format!("Receipt handle {handle} is not valid")))?;

        if let Some(message) = state.messages.remove(position) {
            state.acknowledged.push(message.body);
        }

        Ok(())
    }

    async fn release(&self, handle: &DeliveryHandle) -> Result<(), TransportError> {
        let now = Instant::now();
        {
            let mut state = self.lock();
            let position = state
                .messages
                .iter()
                .position(|m| m.is_in_flight_with(handle, now))
                .ok_or_else(|| self.error(TransportErrorKind::InvalidHandle, format!("Receipt handle {handle} is not valid")))?;

            // Released messages go behind everything already waiting.
            if let Some(mut message) = state.messages.remove(position) {
                message.invisible_until = None;
                state.messages.push_back(message);
            }
        }

        self.notify.notify_waiters();
        Ok(())
    }
}
