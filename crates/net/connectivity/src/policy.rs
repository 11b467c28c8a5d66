//! Two-tier restart policy with blocked-time escalation.

use std::time::Duration;

use cloak_net_primitives::Millis;

/// Soft restarts tolerated before escalating to a hard restart.
pub const DEFAULT_HARD_RESTART_THRESHOLD: u32 = 3;

/// Time spent blocked before a restart is attempted.
pub const DEFAULT_BLOCK_THRESHOLD: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicyConfig {
    pub hard_restart_threshold: u32,
    pub block_threshold: Duration,
}

impl Default for RestartPolicyConfig {
    fn default() -> Self {
        Self {
            hard_restart_threshold: DEFAULT_HARD_RESTART_THRESHOLD,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RestartKind {
    /// Restart the router in place.
    Soft,
    /// Tear everything down and start again.
    Hard,
}

impl RestartKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// What to do on a blocked observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedDecision {
    /// Timer just armed.
    Armed,
    /// Still within the threshold.
    Wait { blocked_for: Duration },
    /// Threshold exceeded; the timer has been cleared.
    Restart,
}

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    config: RestartPolicyConfig,
    attempts: u32,
    blocked_since: Option<Millis>,
}

impl RestartPolicy {
    pub fn new(config: RestartPolicyConfig) -> Self {
        Self {
            config,
            attempts: 0,
            blocked_since: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn blocked_since(&self) -> Option<Millis> {
        self.blocked_since
    }

    pub fn config(&self) -> &RestartPolicyConfig {
        &self.config
    }

    /// Reachable again: the escalation ladder starts over.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    pub fn clear_blocked(&mut self) {
        self.blocked_since = None;
    }

    pub fn on_blocked(&mut self, now: Millis) -> BlockedDecision {
        let Some(since) = self.blocked_since else {
            self.blocked_since = Some(now);
            return BlockedDecision::Armed;
        };

        let blocked_for = Duration::from_millis(now.saturating_sub(since));
        if blocked_for > self.config.block_threshold {
            self.blocked_since = None;
            BlockedDecision::Restart
        } else {
            BlockedDecision::Wait { blocked_for }
        }
    }

    pub fn next_restart(&self) -> RestartKind {
        if self.attempts >= self.config.hard_restart_threshold {
            RestartKind::Hard
        } else {
            RestartKind::Soft
        }
    }

    /// Account for a finished restart. A soft restart always counts as an
    /// attempt; a successful hard restart resets the count.
    pub fn record_restart(&mut self, kind: RestartKind, succeeded: bool) {
        match kind {
            RestartKind::Soft => self.attempts = self.attempts.saturating_add(1),
            RestartKind::Hard if succeeded => self.attempts = 0,
            RestartKind::Hard => {}
        }
        self.blocked_since = None;
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(RestartPolicyConfig::default())
    }
}
