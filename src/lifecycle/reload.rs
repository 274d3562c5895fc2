//! Single-slot reload token
//!
//! The slot holds at most one boolean. Taking waits until the slot is full;
//! putting waits until it is empty. The control loop keeps the token in
//! circulation, so a reload request has to take the token before it can
//! store `true`, and at most one request is ever pending.

use tokio::sync::{Mutex, Notify};

#[derive(Debug)]
pub struct ReloadSlot {
    slot: Mutex<Option<bool>>,
    changed: Notify,
}

impl ReloadSlot {
    /// A slot already holding `initial`.
    pub fn new(initial: bool) -> Self {
        Self {
            slot: Mutex::new(Some(initial)),
            changed: Notify::new(),
        }
    }

    /// Remove the token, waiting for one to be present.
    pub async fn take(&self) -> bool {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.slot.lock().await.take() {
                self.changed.notify_waiters();
                return value;
            }

            notified.await;
        }
    }

    /// Store a token, waiting for the slot to be empty.
    pub async fn put(&self, value: bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slot = self.slot.lock().await;
                if slot.is_none() {
                    *slot = Some(value);
                    drop(slot);
                    self.changed.notify_waiters();
                    return;
                }
            }

            notified.await;
        }
    }

    /// Replace whatever token is present with "reload".
    pub async fn request(&self) {
        self.take().await;
        self.put(true).await;
    }

    /// Current token without consuming it.
    pub async fn peek(&self) -> Option<bool> {
        *self.slot.lock().await
    }
}

impl Default for ReloadSlot {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_take_then_put() {
        let slot = ReloadSlot::new(true);
        assert!(slot.take().await);
        assert_eq!(slot.peek().await, None);
        slot.put(false).await;
        assert_eq!(slot.peek().await, Some(false));
    }

    #[tokio::test]
    async fn test_take_waits_for_put() {
        let slot = Arc::new(ReloadSlot::new(true));
        slot.take().await;

        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.take().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        slot.put(true).await;
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_put_waits_for_take() {
        let slot = Arc::new(ReloadSlot::new(false));

        let producer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.put(true).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert!(!slot.take().await);
        producer.await.unwrap();
        assert!(slot.take().await);
    }

    #[tokio::test]
    async fn test_concurrent_requests_leave_one_token() {
        let slot = Arc::new(ReloadSlot::new(false));

        let a = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.request().await })
        };
        let b = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.request().await })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert!(slot.take().await);
        assert_eq!(slot.peek().await, None);
    }
}
