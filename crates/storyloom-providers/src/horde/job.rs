//! Remote job lifecycle

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Finished,
    Faulted,
    TimedOut,
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Polling => 1,
            Self::Finished | Self::Faulted | Self::TimedOut => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Transitions only move forward; `Polling` may repeat
    pub fn can_transition_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank() || (*self == Self::Polling && next == Self::Polling)
    }
}

/// One accepted job, local to the call that submitted it
#[derive(Debug)]
pub struct Job {
    id: String,
    submitted_at: Instant,
    state: JobState,
    polls: u32,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Instant::now(),
            state: JobState::Submitted,
            polls: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.submitted_at.elapsed()
    }

    /// Apply a transition; illegal ones are ignored and reported as `false`
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(job_id = %self.id, from = ?self.state, to = ?next, "Ignoring illegal job transition");
            return false;
        }
        if next == JobState::Polling {
            self.polls += 1;
        }
        self.state = next;
        true
    }
}
