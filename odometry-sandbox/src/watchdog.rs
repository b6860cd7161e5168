use std::time::{Duration, Instant};

/// Notices when the frame feed has gone quiet.
#[derive(Debug, Clone)]
pub struct StaleFeed {
    timeout: Duration,
    last_frame: Option<Instant>,
}

impl StaleFeed {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_frame: None,
        }
    }

    pub fn observe_frame(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    /// True once `timeout` has passed since the last frame. A feed that never
    /// delivered a frame has nothing displayed and is never stale.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.last_frame
            .map_or(false, |last| now.saturating_duration_since(last) > self.timeout)
    }

    /// Forgets the last frame once the host has acted on staleness.
    pub fn clear(&mut self) {
        self.last_frame = None;
    }
}
