//! Maintenance evaluator (C8, §4.8).
//!
//! Given a monitor and a point in time, decides whether it falls inside
//! an active maintenance window and, if so, which strategy applies. Pure
//! and cacheable on (monitor, minute-bucket of T) the way the spec asks;
//! the cache itself is left to callers since the evaluator has no state
//! of its own — it mirrors the teacher's `ResourceEvaluation::evaluate`
//! in being a free function over plain data.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

use crate::model::{MaintenanceSchedule, MaintenanceStrategy, MaintenanceWindow};

/// The evaluator's verdict for one monitor at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceVerdict {
    None,
    SuppressAlerts,
    PauseProbes,
}

/// Evaluate every window that applies to `monitor_id`, returning the
/// strongest verdict (`PauseProbes` wins over `SuppressAlerts`, which
/// wins over `None`) and, when a window is active, its end time.
pub fn evaluate(windows: &[MaintenanceWindow], monitor_id: &str, at: DateTime<Utc>) -> (MaintenanceVerdict, Option<DateTime<Utc>>) {
    let mut verdict = MaintenanceVerdict::None;
    let mut end_at: Option<DateTime<Utc>> = None;

    for window in windows {
        if !window.active || !window.monitor_ids.iter().any(|id| id == monitor_id) {
            continue;
        }

        if let Some(window_end) = active_until(&window.schedule, at) {
            let strategy_verdict = match window.strategy {
                MaintenanceStrategy::SuppressAlerts => MaintenanceVerdict::SuppressAlerts,
                MaintenanceStrategy::PauseProbes => MaintenanceVerdict::PauseProbes,
            };

            if rank(strategy_verdict) > rank(verdict) {
                verdict = strategy_verdict;
                end_at = window_end;
            }
        }
    }

    (verdict, end_at)
}

fn rank(verdict: MaintenanceVerdict) -> u8 {
    match verdict {
        MaintenanceVerdict::None => 0,
        MaintenanceVerdict::SuppressAlerts => 1,
        MaintenanceVerdict::PauseProbes => 2,
    }
}

/// Returns `Some(end_time)` if `schedule` is active at `at` (`end_time`
/// is `None` for an always-on window with no defined end).
fn active_until(schedule: &MaintenanceSchedule, at: DateTime<Utc>) -> Option<Option<DateTime<Utc>>> {
    match schedule {
        MaintenanceSchedule::AlwaysOn => Some(None),
        MaintenanceSchedule::OneShot { start, end } => {
            if at >= *start && at <= *end {
                Some(Some(*end))
            } else {
                None
            }
        }
        MaintenanceSchedule::Recurring {
            cron_expr,
            timezone,
            duration_secs,
        } => recurring_active_until(cron_expr, timezone, *duration_secs, at),
    }
}

/// Evaluates a cron-like recurring rule in its configured timezone: the
/// window is active if `at` falls within `duration_secs` of the most
/// recent scheduled fire time.
fn recurring_active_until(cron_expr: &str, timezone: &str, duration_secs: u64, at: DateTime<Utc>) -> Option<Option<DateTime<Utc>>> {
    let tz: Tz = Tz::from_str(timezone).ok()?;
    let schedule = cron::Schedule::from_str(cron_expr).ok()?;
    let local_now = at.with_timezone(&tz);

    let duration = Duration::seconds(duration_secs as i64);
    let lookback_start = local_now - duration;

    let mut last_fire = None;
    for occurrence in schedule.after(&lookback_start).take(16) {
        if occurrence > local_now {
            break;
        }
        last_fire = Some(occurrence);
    }

    let last_fire = last_fire?;
    let window_end = last_fire + duration;
    if local_now <= window_end {
        Some(Some(window_end.with_timezone(&Utc)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(strategy: MaintenanceStrategy, schedule: MaintenanceSchedule) -> MaintenanceWindow {
        MaintenanceWindow {
            id: "w1".into(),
            monitor_ids: vec!["m1".into()],
            schedule,
            strategy,
            active: true,
        }
    }

    #[test]
    fn always_on_suppress_alerts_applies() {
        let windows = vec![window(MaintenanceStrategy::SuppressAlerts, MaintenanceSchedule::AlwaysOn)];
        let (verdict, _) = evaluate(&windows, "m1", Utc::now());
        assert_eq!(verdict, MaintenanceVerdict::SuppressAlerts);
    }

    #[test]
    fn one_shot_outside_range_yields_none() {
        let now = Utc::now();
        let windows = vec![window(
            MaintenanceStrategy::PauseProbes,
            MaintenanceSchedule::OneShot {
                start: now - Duration::hours(2),
                end: now - Duration::hours(1),
            },
        )];
        let (verdict, _) = evaluate(&windows, "m1", now);
        assert_eq!(verdict, MaintenanceVerdict::None);
    }

    #[test]
    fn one_shot_inside_range_applies_and_reports_end() {
        let now = Utc::now();
        let end = now + Duration::hours(1);
        let windows = vec![window(
            MaintenanceStrategy::PauseProbes,
            MaintenanceSchedule::OneShot { start: now - Duration::minutes(5), end },
        )];
        let (verdict, end_at) = evaluate(&windows, "m1", now);
        assert_eq!(verdict, MaintenanceVerdict::PauseProbes);
        assert_eq!(end_at, Some(end));
    }

    #[test]
    fn inactive_window_is_ignored() {
        let mut w = window(MaintenanceStrategy::SuppressAlerts, MaintenanceSchedule::AlwaysOn);
        w.active = false;
        let (verdict, _) = evaluate(&[w], "m1", Utc::now());
        assert_eq!(verdict, MaintenanceVerdict::None);
    }

    #[test]
    fn unrelated_monitor_is_ignored() {
        let windows = vec![window(MaintenanceStrategy::SuppressAlerts, MaintenanceSchedule::AlwaysOn)];
        let (verdict, _) = evaluate(&windows, "other-monitor", Utc::now());
        assert_eq!(verdict, MaintenanceVerdict::None);
    }

    #[test]
    fn pause_probes_outranks_suppress_alerts() {
        let now = Utc::now();
        let windows = vec![
            window(MaintenanceStrategy::SuppressAlerts, MaintenanceSchedule::AlwaysOn),
            window(
                MaintenanceStrategy::PauseProbes,
                MaintenanceSchedule::OneShot {
                    start: now - Duration::minutes(1),
                    end: now + Duration::minutes(1),
                },
            ),
        ];
        let (verdict, _) = evaluate(&windows, "m1", now);
        assert_eq!(verdict, MaintenanceVerdict::PauseProbes);
    }
}
