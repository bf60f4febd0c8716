//! Single-slot snapshot mailbox between producer and controller
//!
//! The slot holds at most one undelivered snapshot: a send replaces (and
//! returns) whatever is still unread, so a slow consumer always observes the
//! freshest sample instead of a backlog. Receive waits up to a bounded
//! timeout and treats expiry as normal flow control.

use crate::models::MetricsSnapshot;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

struct Slot {
    snapshot: Mutex<Option<MetricsSnapshot>>,
    notify: Notify,
}

/// Producer half of the mailbox
#[derive(Clone)]
pub struct MailboxSender {
    slot: Arc<Slot>,
}

/// Consumer half of the mailbox; single consumer by construction
pub struct MailboxReceiver {
    slot: Arc<Slot>,
}

/// Create a connected sender/receiver pair
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let slot = Arc::new(Slot {
        snapshot: Mutex::new(None),
        notify: Notify::new(),
    });
    (
        MailboxSender { slot: slot.clone() },
        MailboxReceiver { slot },
    )
}

impl MailboxSender {
    /// Deliver a snapshot, returning any unread predecessor it replaced
    pub fn send(&self, snapshot: MetricsSnapshot) -> Option<MetricsSnapshot> {
        let superseded = self
            .slot
            .snapshot
            .lock()
            .expect("mailbox lock poisoned")
            .replace(snapshot);
        self.slot.notify.notify_one();
        superseded
    }
}

impl MailboxReceiver {
    /// Take the pending snapshot, waiting up to `timeout`; `None` on expiry
    pub async fn recv(&mut self, timeout: Duration) -> Option<MetricsSnapshot> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(snapshot) = self.take() {
                return Some(snapshot);
            }
            // notify_one stores a permit, so a send between the take above
            // and this await is not lost
            if timeout_at(deadline, self.slot.notify.notified())
                .await
                .is_err()
            {
                return self.take();
            }
        }
    }

    /// Non-blocking take of the pending snapshot
    pub fn try_recv(&mut self) -> Option<MetricsSnapshot> {
        self.take()
    }

    fn take(&self) -> Option<MetricsSnapshot> {
        self.slot
            .snapshot
            .lock()
            .expect("mailbox lock poisoned")
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(sequence: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            sequence,
            captured_at: 0,
            pods: vec![],
            nodes: vec![],
        }
    }

    #[tokio::test]
    async fn recv_times_out_when_empty() {
        let (_tx, mut rx) = mailbox();
        assert!(rx.recv(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn send_before_recv_is_not_lost() {
        let (tx, mut rx) = mailbox();
        tx.send(snapshot(1));

        let received = rx.recv(Duration::from_millis(20)).await.unwrap();
        assert_eq!(received.sequence, 1);
    }

    #[tokio::test]
    async fn send_replaces_unread_snapshot() {
        let (tx, mut rx) = mailbox();
        assert!(tx.send(snapshot(1)).is_none());

        let superseded = tx.send(snapshot(2)).unwrap();
        assert_eq!(superseded.sequence, 1);

        let received = rx.recv(Duration::from_millis(20)).await.unwrap();
        assert_eq!(received.sequence, 2);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn recv_wakes_on_late_send() {
        let (tx, mut rx) = mailbox();

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(snapshot(9));
        });

        let received = rx.recv(Duration::from_secs(1)).await.unwrap();
        assert_eq!(received.sequence, 9);
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_consumed_exactly_once() {
        let (tx, mut rx) = mailbox();
        tx.send(snapshot(3));

        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
        assert!(rx.recv(Duration::from_millis(10)).await.is_none());
    }
}
