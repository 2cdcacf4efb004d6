/// A cooperative one-shot timer polled against the cycle clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountdownTimer {
    deadline_us: Option<u64>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to expire `duration_us` after `now_us`.
    pub fn start(&mut self, now_us: u64, duration_us: u64) {
        self.deadline_us = Some(now_us.saturating_add(duration_us));
    }

    pub fn cancel(&mut self) {
        self.deadline_us = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_us.is_some()
    }

    /// True once `now_us` has reached the deadline. A timer that was never
    /// armed counts as expired.
    pub fn is_expired(&self, now_us: u64) -> bool {
        self.deadline_us.is_none_or(|deadline| now_us >= deadline)
    }
}
