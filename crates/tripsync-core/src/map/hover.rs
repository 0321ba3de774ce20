use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::PlaceId;

/// Delayed hide for a hovered marker.
///
/// Owning the timer is owning the pending hide: dropping it cancels the task,
/// so replacing the hover state can never leave a stale timer running.
#[derive(Debug)]
pub(crate) struct HideTimer {
    id: u64,
    handle: Option<JoinHandle<()>>,
}

impl HideTimer {
    pub(crate) fn start<F>(id: u64, delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        Self {
            id,
            handle: Some(handle),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Release without aborting; used by the timer's own task when it fires.
    pub(crate) fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for HideTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Default)]
pub(crate) enum HoverState {
    #[default]
    Idle,
    Hovering(PlaceId),
    PendingHide { place_id: PlaceId, timer: HideTimer },
}

impl HoverState {
    /// The marker currently shown as highlighted, if any.
    pub(crate) fn highlighted(&self) -> Option<&PlaceId> {
        match self {
            HoverState::Idle => None,
            HoverState::Hovering(id) | HoverState::PendingHide { place_id: id, .. } => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = HideTimer::start(1, Duration::from_millis(100), move || {
            flag.store(true, Ordering::SeqCst);
        });
        drop(timer);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _timer = HideTimer::start(1, Duration::from_millis(100), move || {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_highlighted() {
        assert_eq!(HoverState::Idle.highlighted(), None);
        assert_eq!(
            HoverState::Hovering("a".to_string()).highlighted().map(String::as_str),
            Some("a")
        );
    }
}
