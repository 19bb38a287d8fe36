//! Notification Queue and the send-or-queue gate
//!
//! Every administrator notification produced by the monitors passes through
//! [`SendGate::send_or_queue`]. While the link is known to be down, or when a
//! delivery attempt fails, the message is appended to an in-memory FIFO.
//! [`SendGate::flush`] replays that FIFO once connectivity returns.
//!
//! ## Ordering
//!
//! ```text
//! send_or_queue(A, down)  ──→ [A]
//! send_or_queue(B, down)  ──→ [A, B]
//! send_or_queue(C, up) ✗  ──→ [A, B, C]
//! flush()                 ──→ A, pace, B, pace, C
//! ```
//!
//! A failure during flush re-appends the entry to the tail, so the rest of
//! the queue is attempted before the failed entry is retried. The queue is
//! process memory only; an unclean shutdown loses it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hostwatch_core::domain::OutboundMessage;
use hostwatch_core::ports::IMessenger;
use tracing::{debug, info, warn};

// ============================================================================
// NotificationQueue
// ============================================================================

/// A message waiting for delivery, tagged with its enqueue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNotification {
    pub seq: u64,
    pub message: OutboundMessage,
}

#[derive(Debug, Default)]
struct QueueInner {
    entries: VecDeque<QueuedNotification>,
    next_seq: u64,
}

/// Strict FIFO of undelivered notifications
///
/// No deduplication, no priority, no expiry.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    inner: Mutex<QueueInner>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message to the tail and returns its sequence number
    pub fn push(&self, message: OutboundMessage) -> u64 {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .entries
            .push_back(QueuedNotification { seq, message });
        seq
    }

    /// Re-appends an entry that failed to deliver, keeping its original tag
    pub fn requeue(&self, entry: QueuedNotification) {
        self.lock().entries.push_back(entry);
    }

    pub fn pop_front(&self) -> Option<QueuedNotification> {
        self.lock().entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Copy of the queued messages, head first
    pub fn snapshot(&self) -> Vec<OutboundMessage> {
        self.lock()
            .entries
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }
}

// ============================================================================
// SendGate
// ============================================================================

/// Result of a single [`SendGate::send_or_queue`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Queued,
}

/// Counters for one [`SendGate::flush`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    /// Delivery failures that were pushed back to the tail
    pub requeued: usize,
}

/// The single send-or-queue decision point for outbound notifications
pub struct SendGate {
    messenger: Arc<dyn IMessenger>,
    queue: NotificationQueue,
    pacing: Duration,
    /// Serializes flushes so two recoveries never interleave their replay
    flush_lock: tokio::sync::Mutex<()>,
}

impl SendGate {
    /// Creates a gate delivering through `messenger`
    ///
    /// # Arguments
    /// * `messenger` - Chat delivery adapter
    /// * `pacing` - Delay between consecutive sends during a flush
    pub fn new(messenger: Arc<dyn IMessenger>, pacing: Duration) -> Self {
        Self {
            messenger,
            queue: NotificationQueue::new(),
            pacing,
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn messenger(&self) -> &Arc<dyn IMessenger> {
        &self.messenger
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> Vec<OutboundMessage> {
        self.queue.snapshot()
    }

    /// Delivers `message` now, or queues it for the next flush
    ///
    /// When `is_down` is true no delivery is attempted. A failed attempt is
    /// treated exactly like a known outage.
    pub async fn send_or_queue(&self, message: OutboundMessage, is_down: bool) -> SendOutcome {
        if is_down {
            let seq = self.queue.push(message);
            debug!(seq, queued = self.queue.len(), "Link down, notification queued");
            return SendOutcome::Queued;
        }

        match self.messenger.send_message(&message).await {
            Ok(()) => SendOutcome::Delivered,
            Err(e) => {
                let seq = self.queue.push(message);
                warn!(seq, error = %e, "Notification delivery failed, queued for retry");
                SendOutcome::Queued
            }
        }
    }

    /// Replays the queue head to tail with a pacing delay between sends
    ///
    /// Failed entries go back to the tail. The pass ends when the queue is
    /// empty, which never happens if the endpoint stays broken.
    pub async fn flush(&self) -> FlushReport {
        let _serial = self.flush_lock.lock().await;
        let mut report = FlushReport::default();

        if self.queue.is_empty() {
            return report;
        }

        info!(queued = self.queue.len(), "Flushing queued notifications");

        let mut first = true;
        while let Some(entry) = self.queue.pop_front() {
            if !first {
                tokio::time::sleep(self.pacing).await;
            }
            first = false;

            match self.messenger.send_message(&entry.message).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(seq = entry.seq, "Queued notification delivered");
                }
                Err(e) => {
                    report.requeued += 1;
                    warn!(seq = entry.seq, error = %e, "Queued notification failed, moved to tail");
                    self.queue.requeue(entry);
                }
            }
        }

        info!(
            delivered = report.delivered,
            requeued = report.requeued,
            "Notification queue drained"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gate, RecordingMessenger, ADMIN};

    fn msg(text: &str) -> OutboundMessage {
        OutboundMessage::markdown(ADMIN, text)
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = NotificationQueue::new();
        assert!(queue.is_empty());

        assert_eq!(queue.push(msg("A")), 0);
        assert_eq!(queue.push(msg("B")), 1);
        assert_eq!(queue.len(), 2);

        let head = queue.pop_front().unwrap();
        assert_eq!(head.message.text, "A");
        queue.requeue(head);

        let texts: Vec<_> = queue.snapshot().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_down_queues_without_attempt() {
        let messenger = RecordingMessenger::new();
        let gate = gate(&messenger, Duration::from_millis(500));

        let outcome = gate.send_or_queue(msg("A"), true).await;

        assert_eq!(outcome, SendOutcome::Queued);
        assert!(messenger.attempts.lock().unwrap().is_empty());
        assert_eq!(gate.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_up_delivers_immediately() {
        let messenger = RecordingMessenger::new();
        let gate = gate(&messenger, Duration::from_millis(500));

        let outcome = gate.send_or_queue(msg("A"), false).await;

        assert_eq!(outcome, SendOutcome::Delivered);
        assert_eq!(messenger.texts(), vec!["A"]);
        assert_eq!(gate.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_joins_tail_behind_down_messages() {
        let messenger = RecordingMessenger::new();
        messenger.fail_text("C", 1);
        let gate = gate(&messenger, Duration::from_millis(500));

        gate.send_or_queue(msg("A"), true).await;
        gate.send_or_queue(msg("B"), true).await;
        assert_eq!(gate.send_or_queue(msg("C"), false).await, SendOutcome::Queued);

        let texts: Vec<_> = gate.queued().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_preserves_order_and_pacing() {
        let messenger = RecordingMessenger::new();
        let pacing = Duration::from_millis(500);
        let gate = gate(&messenger, pacing);

        for text in ["A", "B", "C"] {
            gate.send_or_queue(msg(text), true).await;
        }

        let report = gate.flush().await;

        assert_eq!(report, FlushReport { delivered: 3, requeued: 0 });
        assert_eq!(messenger.texts(), vec!["A", "B", "C"]);
        let stamps = messenger.timestamps();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= pacing);
        }
        assert_eq!(gate.queued_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_moves_entry_to_tail() {
        let messenger = RecordingMessenger::new();
        messenger.fail_text("B", 1);
        let gate = gate(&messenger, Duration::from_millis(500));

        for text in ["A", "B", "C"] {
            gate.send_or_queue(msg(text), true).await;
        }

        let report = gate.flush().await;

        assert_eq!(report, FlushReport { delivered: 3, requeued: 1 });
        assert_eq!(
            *messenger.attempts.lock().unwrap(),
            vec!["A", "B", "C", "B"]
        );
        assert_eq!(messenger.texts(), vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_is_noop() {
        let messenger = RecordingMessenger::new();
        let gate = gate(&messenger, Duration::from_millis(500));

        assert_eq!(gate.flush().await, FlushReport::default());
        assert!(messenger.attempts.lock().unwrap().is_empty());
    }
}
