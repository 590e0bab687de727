//! Retry & state machine (C6, §4.6).
//!
//! Converts a raw probe `Result` plus the previous heartbeat into a new
//! `Heartbeat` row and an "important transition" flag, generalizing the
//! teacher's grace-period counter (`ResourceEvaluation::evaluate` in
//! `monitors/resources.rs`) from "exceed a numeric limit" to "exhaust a
//! retry budget". The retry counter here plays the role the teacher's
//! `temp_grace_counter`/`usage_grace_counter` play there.

use crate::model::{Heartbeat, MaintenanceStrategy, ProbeOutcome, Status};

/// Per-monitor runtime state the retry layer owns exclusively (§5: single
/// writer). Reset whenever the monitor is reconfigured (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryState {
    pub retries: u32,
    pub last_status: Option<Status>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.retries = 0;
        self.last_status = None;
    }
}

/// Result of folding one probe outcome into the retry state machine.
pub struct Transition {
    pub heartbeat: Heartbeat,
    pub important: bool,
}

/// Apply one probe `Result` to the retry state, producing the next
/// heartbeat row (§4.6's numbered rules, evaluated in order).
#[allow(clippy::too_many_arguments)]
pub fn apply(
    state: &mut RetryState,
    monitor_id: &str,
    sequence: u64,
    outcome: &ProbeOutcome,
    max_retries: u32,
    maintenance: Option<MaintenanceStrategy>,
) -> Transition {
    let prev = state.last_status;

    if matches!(maintenance, Some(MaintenanceStrategy::SuppressAlerts)) {
        let important = prev != Some(Status::Maint);
        state.last_status = Some(Status::Maint);
        return finish(monitor_id, sequence, outcome, Status::Maint, 0, important);
    }

    let transition = match outcome.status {
        Status::Up => {
            state.retries = 0;
            let important = prev != Some(Status::Up);
            state.last_status = Some(Status::Up);
            finish(monitor_id, sequence, outcome, Status::Up, 0, important)
        }
        Status::Pending => {
            let important = prev != Some(Status::Pending);
            state.last_status = Some(Status::Pending);
            finish(monitor_id, sequence, outcome, Status::Pending, state.retries, important)
        }
        Status::Maint => {
            // An executor never reports Maint itself; treat as an
            // internal inconsistency but still record something sane.
            let important = prev != Some(Status::Maint);
            state.last_status = Some(Status::Maint);
            finish(monitor_id, sequence, outcome, Status::Maint, 0, important)
        }
        Status::Down => {
            state.retries = state.retries.saturating_add(1);
            if state.retries <= max_retries.max(1) {
                let important = false;
                state.last_status = Some(Status::Pending);
                finish(monitor_id, sequence, outcome, Status::Pending, state.retries, important)
            } else {
                let important = prev != Some(Status::Down);
                state.last_status = Some(Status::Down);
                finish(monitor_id, sequence, outcome, Status::Down, state.retries, important)
            }
        }
    };

    transition
}

fn finish(
    monitor_id: &str,
    sequence: u64,
    outcome: &ProbeOutcome,
    status: Status,
    retries: u32,
    important: bool,
) -> Transition {
    Transition {
        heartbeat: Heartbeat {
            monitor_id: monitor_id.to_string(),
            sequence,
            timestamp: outcome.end_time,
            status,
            message: outcome.message.clone(),
            latency_ms: outcome.latency_ms(),
            retries,
            important,
        },
        important,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn outcome(status: Status, message: &str) -> ProbeOutcome {
        ProbeOutcome::new(status, message, Utc::now())
    }

    #[test]
    fn first_up_is_important() {
        let mut state = RetryState::new();
        let t = apply(&mut state, "m1", 1, &outcome(Status::Up, "ok"), 2, None);
        assert_eq!(t.heartbeat.status, Status::Up);
        assert!(t.important);
    }

    #[test]
    fn repeated_up_is_not_important() {
        let mut state = RetryState::new();
        apply(&mut state, "m1", 1, &outcome(Status::Up, "ok"), 2, None);
        let t = apply(&mut state, "m1", 2, &outcome(Status::Up, "ok"), 2, None);
        assert!(!t.important);
    }

    /// S2 (maxRetries=2): tick1 PENDING retries=1, tick2 PENDING retries=2,
    /// tick3 crosses the budget into DOWN.
    #[test]
    fn degrades_to_down_after_max_retries() {
        let mut state = RetryState::new();
        apply(&mut state, "m1", 1, &outcome(Status::Up, "ok"), 2, None);

        let t1 = apply(&mut state, "m1", 2, &outcome(Status::Down, "500"), 2, None);
        assert_eq!(t1.heartbeat.status, Status::Pending);
        assert_eq!(t1.heartbeat.retries, 1);
        assert!(!t1.important);

        let t2 = apply(&mut state, "m1", 3, &outcome(Status::Down, "500"), 2, None);
        assert_eq!(t2.heartbeat.status, Status::Pending);
        assert_eq!(t2.heartbeat.retries, 2);
        assert!(!t2.important);

        let t3 = apply(&mut state, "m1", 4, &outcome(Status::Down, "500"), 2, None);
        assert_eq!(t3.heartbeat.status, Status::Down);
        assert_eq!(t3.heartbeat.retries, 3);
        assert!(t3.important);

        let t4 = apply(&mut state, "m1", 5, &outcome(Status::Down, "500"), 2, None);
        assert_eq!(t4.heartbeat.status, Status::Down);
        assert!(!t4.important);
    }

    #[test]
    fn maintenance_suppresses_underlying_result() {
        let mut state = RetryState::new();
        let t1 = apply(&mut state, "m1", 1, &outcome(Status::Down, "500"), 1, Some(MaintenanceStrategy::SuppressAlerts));
        assert_eq!(t1.heartbeat.status, Status::Maint);
        assert!(t1.important);

        let t2 = apply(&mut state, "m1", 2, &outcome(Status::Down, "500"), 1, Some(MaintenanceStrategy::SuppressAlerts));
        assert_eq!(t2.heartbeat.status, Status::Maint);
        assert!(!t2.important);
    }

    #[test]
    fn reconfiguration_resets_state() {
        let mut state = RetryState::new();
        apply(&mut state, "m1", 1, &outcome(Status::Down, "500"), 3, None);
        assert_eq!(state.retries, 1);
        state.reset();
        assert_eq!(state.retries, 0);
        assert!(state.last_status.is_none());
    }
}
