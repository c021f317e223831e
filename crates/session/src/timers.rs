use std::pin::Pin;

use tokio::time::{sleep_until, Duration, Instant, Sleep};

/// Single-slot delayed task.
///
/// At most one deadline is pending at a time: arming replaces any
/// previous deadline (last-write-wins), cancelling clears it. The owner
/// reads whatever state it needs when `fired` resolves, so the payload is
/// always current at fire time rather than at schedule time.
#[derive(Default)]
pub struct DelaySlot {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl DelaySlot {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Arm the slot, replacing any pending deadline.
    pub fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(sleep_until(Instant::now() + delay)));
    }

    /// Cancel the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed deadline elapses; pends forever while idle.
    /// Cancel-safe: an unfired deadline stays armed if this future is
    /// dropped by a `select!`.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut slot = DelaySlot::idle();
        slot.arm(Duration::from_millis(100));
        assert!(slot.is_armed());

        slot.fired().await;
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_slot_pends() {
        let mut slot = DelaySlot::idle();
        let result = timeout(Duration::from_millis(10), slot.fired()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut slot = DelaySlot::idle();
        slot.arm(Duration::from_millis(100));
        advance(Duration::from_millis(60)).await;

        // Rearming pushes the deadline out; the old one never fires.
        slot.arm(Duration::from_millis(100));
        advance(Duration::from_millis(60)).await;
        let result = timeout(Duration::from_millis(1), slot.fired()).await;
        assert!(result.is_err());

        advance(Duration::from_millis(50)).await;
        timeout(Duration::from_millis(1), slot.fired())
            .await
            .expect("slot should fire at the rearmed deadline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut slot = DelaySlot::idle();
        slot.arm(Duration::from_millis(100));
        slot.cancel();
        assert!(!slot.is_armed());

        advance(Duration::from_millis(200)).await;
        let result = timeout(Duration::from_millis(1), slot.fired()).await;
        assert!(result.is_err());
    }
}
