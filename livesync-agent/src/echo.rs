//! Echo suppression for the bidirectional agent.
//!
//! ```text
//! idle --begin_inbound--> applying-inbound --finish_inbound--> settling
//!   ^                                                              |
//!   +-------------------- grace elapsed (poll) --------------------+
//! ```
//!
//! Outbound saves are allowed only in `idle`. `begin_inbound` is legal from
//! every state; a new inbound update during `settling` drops the old grace
//! deadline.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoState {
    Idle,
    ApplyingInbound,
    Settling { until: Instant },
}

#[derive(Debug, Clone)]
pub struct EchoGuard {
    state: EchoState,
    grace: Duration,
}

impl EchoGuard {
    pub fn new(grace: Duration) -> Self {
        Self {
            state: EchoState::Idle,
            grace,
        }
    }

    pub fn state(&self) -> EchoState {
        self.state
    }

    /// Enter `applying-inbound`. Must be called before yielding to the load.
    pub fn begin_inbound(&mut self) {
        self.state = EchoState::ApplyingInbound;
    }

    /// The load settled (either way); start the grace period.
    pub fn finish_inbound(&mut self, now: Instant) {
        if self.state == EchoState::ApplyingInbound {
            self.state = EchoState::Settling {
                until: now + self.grace,
            };
        }
    }

    /// Advance `settling` to `idle` once the grace period has passed.
    pub fn poll(&mut self, now: Instant) -> EchoState {
        if let EchoState::Settling { until } = self.state {
            if now >= until {
                self.state = EchoState::Idle;
            }
        }
        self.state
    }

    pub fn allows_outbound(&mut self, now: Instant) -> bool {
        self.poll(now) == EchoState::Idle
    }

    pub fn settle_deadline(&self) -> Option<Instant> {
        match self.state {
            EchoState::Settling { until } => Some(until),
            _ => None,
        }
    }
}
