//! Tick schedule.
//!
//! Accepts the part of cron syntax a single periodic trigger needs: the
//! minute field may be `*`, `*/N` or a fixed minute `M`, every other field
//! must be `*`. `@every 30s` / `@every 2m` schedules are aligned to the
//! Unix epoch. All arithmetic is in UTC.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR_MINUTES: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported schedule expression {expression:?}: {reason}")]
pub struct ScheduleError {
    pub expression: String,
    pub reason: String,
}

impl ScheduleError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// When cycles fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSchedule {
    /// Fixed spacing, aligned to multiples of the interval since the epoch.
    Every(Duration),
    /// Minutes of the hour divisible by the step (`*` is a step of 1).
    MinuteStep(u32),
    /// Once an hour at the given minute.
    HourlyAt(u32),
}

impl TickSchedule {
    /// First tick strictly after `now`.
    pub fn next_after(&self, now: SystemTime) -> SystemTime {
        let secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let next = match *self {
            TickSchedule::Every(interval) => {
                let step = interval.as_secs().max(1);
                (secs / step + 1) * step
            }
            TickSchedule::MinuteStep(step) => {
                next_minute_where(secs, |m| m % u64::from(step.max(1)) == 0)
            }
            TickSchedule::HourlyAt(minute) => next_minute_where(secs, |m| m == u64::from(minute)),
        };

        UNIX_EPOCH + Duration::from_secs(next)
    }
}

fn next_minute_where(secs: u64, matches: impl Fn(u64) -> bool) -> u64 {
    let mut minute = secs / MINUTE + 1;
    while !matches(minute % HOUR_MINUTES) {
        minute += 1;
    }
    minute * MINUTE
}

impl FromStr for TickSchedule {
    type Err = ScheduleError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let trimmed = expression.trim();

        if let Some(rest) = trimmed.strip_prefix("@every") {
            return parse_every(expression, rest.trim());
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::new(expression, "expected five cron fields"));
        }
        if fields[1..].iter().any(|f| *f != "*") {
            return Err(ScheduleError::new(
                expression,
                "only the minute field may be restricted",
            ));
        }

        let minute = fields[0];
        if minute == "*" {
            return Ok(TickSchedule::MinuteStep(1));
        }
        if let Some(step) = minute.strip_prefix("*/") {
            return match step.parse::<u32>() {
                Ok(n) if (1..60).contains(&n) => Ok(TickSchedule::MinuteStep(n)),
                _ => Err(ScheduleError::new(expression, "minute step must be 1-59")),
            };
        }
        match minute.parse::<u32>() {
            Ok(m) if m < 60 => Ok(TickSchedule::HourlyAt(m)),
            _ => Err(ScheduleError::new(expression, "minute must be *, */N or 0-59")),
        }
    }
}

fn parse_every(expression: &str, interval: &str) -> Result<TickSchedule, ScheduleError> {
    let (number, multiplier) = if let Some(n) = interval.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = interval.strip_suffix('m') {
        (n, MINUTE)
    } else {
        return Err(ScheduleError::new(expression, "@every needs an s or m suffix"));
    };
    match number.parse::<u64>() {
        Ok(n) if n > 0 => Ok(TickSchedule::Every(Duration::from_secs(n * multiplier))),
        _ => Err(ScheduleError::new(expression, "@every interval must be a positive integer")),
    }
}

impl fmt::Display for TickSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickSchedule::Every(d) => write!(f, "@every {}s", d.as_secs()),
            TickSchedule::MinuteStep(1) => f.write_str("* * * * *"),
            TickSchedule::MinuteStep(n) => write!(f, "*/{n} * * * *"),
            TickSchedule::HourlyAt(m) => write!(f, "{m} * * * *"),
        }
    }
}

/// Cycle period and per-check timeout, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    pub period: Duration,
    pub check_timeout: Duration,
}

impl CycleTiming {
    /// Period is the spacing of the next two ticks after `now`, floored at
    /// `min_period`. Checks get half the period, at least one second.
    pub fn derive(schedule: &TickSchedule, now: SystemTime, min_period: Duration) -> Self {
        let first = schedule.next_after(now);
        let second = schedule.next_after(first);
        let mut period = second.duration_since(first).unwrap_or(min_period);

        if period < min_period {
            tracing::warn!(
                schedule = %schedule,
                period_secs = period.as_secs(),
                min_secs = min_period.as_secs(),
                "Schedule period is shorter than the minimum, adjusting"
            );
            period = min_period;
        }

        let check_timeout = Duration::from_secs((period.as_secs() / 2).max(1));
        Self {
            period,
            check_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn secs(t: SystemTime) -> u64 {
        t.duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn parses_supported_forms() {
        let parse = |s: &str| s.parse::<TickSchedule>();
        assert_eq!(parse("*/5 * * * *"), Ok(TickSchedule::MinuteStep(5)));
        assert_eq!(parse("* * * * *"), Ok(TickSchedule::MinuteStep(1)));
        assert_eq!(parse("30 * * * *"), Ok(TickSchedule::HourlyAt(30)));
        assert_eq!(parse("@every 30s"), Ok(TickSchedule::Every(Duration::from_secs(30))));
        assert_eq!(parse("@every 2m"), Ok(TickSchedule::Every(Duration::from_secs(120))));
    }

    #[test]
    fn rejects_unsupported_forms() {
        for expr in ["", "*/5 * * *", "0 3 * * *", "*/0 * * * *", "61 * * * *", "@every", "@every 5h", "@every 0s"] {
            assert!(expr.parse::<TickSchedule>().is_err(), "{expr:?} should be rejected");
        }
    }

    #[test]
    fn minute_step_aligns_to_wall_clock() {
        let schedule = TickSchedule::MinuteStep(5);
        // 00:03:10 → 00:05:00
        assert_eq!(secs(schedule.next_after(at(190))), 300);
        // Exactly on a tick → the following one.
        assert_eq!(secs(schedule.next_after(at(300))), 600);
        // 00:58:00 → 01:00:00
        assert_eq!(secs(schedule.next_after(at(3480))), 3600);
    }

    #[test]
    fn hourly_at_waits_for_minute() {
        let schedule = TickSchedule::HourlyAt(30);
        assert_eq!(secs(schedule.next_after(at(0))), 1800);
        assert_eq!(secs(schedule.next_after(at(1800))), 5400);
    }

    #[test]
    fn every_aligns_to_epoch() {
        let schedule = TickSchedule::Every(Duration::from_secs(30));
        assert_eq!(secs(schedule.next_after(at(31))), 60);
        assert_eq!(secs(schedule.next_after(at(60))), 90);
    }

    #[test]
    fn timing_uses_half_the_period() {
        let timing = CycleTiming::derive(&TickSchedule::MinuteStep(5), at(0), Duration::from_secs(5));
        assert_eq!(timing.period, Duration::from_secs(300));
        assert_eq!(timing.check_timeout, Duration::from_secs(150));
    }

    #[test]
    fn short_period_is_floored() {
        let schedule = TickSchedule::Every(Duration::from_secs(1));
        let timing = CycleTiming::derive(&schedule, at(0), Duration::from_secs(5));
        assert_eq!(timing.period, Duration::from_secs(5));
        assert_eq!(timing.check_timeout, Duration::from_secs(2));

        let tiny = CycleTiming::derive(&schedule, at(0), Duration::from_secs(1));
        assert_eq!(tiny.check_timeout, Duration::from_secs(1));
    }
}
