//! Crawl Scheduler
//!
//! Runs the crawler at a daily time and a weekly day/time, both in local time.
//! A failed run is logged and the scheduler waits for the next slot.

use crate::crawler::Crawler;
use bizdir_common::config::ScheduleConfig;
use bizdir_common::{Error, Result};
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Weekday};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Which schedule slot triggered a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Daily,
    Weekly,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Daily => write!(f, "daily"),
            RunKind::Weekly => write!(f, "weekly"),
        }
    }
}

/// Next scheduled run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRun {
    pub at: NaiveDateTime,
    pub kind: RunKind,
}

/// Daily run time plus an optional weekly day/time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    daily_at: NaiveTime,
    weekly: Option<(Weekday, NaiveTime)>,
}

impl Schedule {
    pub fn new(daily_at: NaiveTime, weekly: Option<(Weekday, NaiveTime)>) -> Self {
        Self { daily_at, weekly }
    }

    /// Parse `HH:MM` times and an English weekday name
    ///
    /// A blank `weekly_day` disables the weekly run.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let daily_at = parse_time(&config.daily_at)?;

        let weekly = if config.weekly_day.trim().is_empty() {
            None
        } else {
            let day = config
                .weekly_day
                .trim()
                .parse::<Weekday>()
                .map_err(|_| Error::Config(format!("Invalid weekday '{}'", config.weekly_day)))?;
            Some((day, parse_time(&config.weekly_at)?))
        };

        Ok(Self { daily_at, weekly })
    }

    /// Earliest slot strictly after `now`; weekly wins a tie
    pub fn next_run_after(&self, now: NaiveDateTime) -> ScheduledRun {
        let mut daily = now.date().and_time(self.daily_at);
        if daily <= now {
            daily += ChronoDuration::days(1);
        }
        let mut next = ScheduledRun {
            at: daily,
            kind: RunKind::Daily,
        };

        if let Some((day, time)) = self.weekly {
            let days_ahead = (7 + day.num_days_from_monday() as i64
                - now.weekday().num_days_from_monday() as i64)
                % 7;
            let mut weekly = (now.date() + ChronoDuration::days(days_ahead)).and_time(time);
            if weekly <= now {
                weekly += ChronoDuration::weeks(1);
            }
            if weekly <= next.at {
                next = ScheduledRun {
                    at: weekly,
                    kind: RunKind::Weekly,
                };
            }
        }

        next
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("Invalid time '{}': {}", value, e)))
}

/// Run crawls on `schedule` until `shutdown` completes
///
/// Shutdown is honoured while waiting; a crawl in progress runs to completion.
pub async fn run_forever<F>(crawler: &Crawler, schedule: &Schedule, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Local::now().naive_local();
        let next = schedule.next_run_after(now);
        let wait = (next.at - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next.at, kind = %next.kind, wait_secs = wait.as_secs(), "Waiting for next scheduled crawl");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut shutdown => {
                info!("Scheduler stopped");
                return;
            }
        }

        info!(kind = %next.kind, "Starting scheduled crawl");
        let started = Instant::now();
        match crawler.run().await {
            Ok(report) => info!(
                kind = %next.kind,
                records = report.records,
                failed_adapters = report.failures.len(),
                duration_secs = started.elapsed().as_secs_f64(),
                "Scheduled crawl completed"
            ),
            Err(e) => error!(
                kind = %next.kind,
                error = %e,
                duration_secs = started.elapsed().as_secs_f64(),
                "Scheduled crawl failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn default_schedule() -> Schedule {
        Schedule::from_config(&ScheduleConfig::default()).unwrap()
    }

    #[test]
    fn test_daily_later_today() {
        // 2024-01-03 is a Wednesday
        let next = default_schedule().next_run_after(at(2024, 1, 3, 1, 0));
        assert_eq!(next, ScheduledRun { at: at(2024, 1, 3, 2, 0), kind: RunKind::Daily });
    }

    #[test]
    fn test_daily_rolls_to_tomorrow() {
        let next = default_schedule().next_run_after(at(2024, 1, 3, 2, 0));
        assert_eq!(next.at, at(2024, 1, 4, 2, 0));
        assert_eq!(next.kind, RunKind::Daily);
    }

    #[test]
    fn test_weekly_after_daily_on_sunday() {
        // 2024-01-07 is a Sunday; daily 02:00 already passed
        let next = default_schedule().next_run_after(at(2024, 1, 7, 2, 30));
        assert_eq!(next, ScheduledRun { at: at(2024, 1, 7, 3, 0), kind: RunKind::Weekly });
    }

    #[test]
    fn test_daily_precedes_next_weekly() {
        let schedule = Schedule::new(
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            Some((Weekday::Sun, NaiveTime::from_hms_opt(3, 0, 0).unwrap())),
        );
        let next = schedule.next_run_after(at(2024, 1, 7, 4, 0));
        assert_eq!(next.kind, RunKind::Daily);
        assert_eq!(next.at, at(2024, 1, 7, 23, 0));
    }

    #[test]
    fn test_weekly_rolls_to_following_sunday() {
        let time = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
        let schedule = Schedule::new(time, Some((Weekday::Sun, time)));

        // Sunday's weekly slot has passed; six daily runs come first
        let mut now = at(2024, 1, 7, 4, 0);
        for day in 8..=13 {
            let next = schedule.next_run_after(now);
            assert_eq!(next, ScheduledRun { at: at(2024, 1, day, 3, 0), kind: RunKind::Daily });
            now = next.at;
        }

        let next = schedule.next_run_after(now);
        assert_eq!(next, ScheduledRun { at: at(2024, 1, 14, 3, 0), kind: RunKind::Weekly });
    }

    #[test]
    fn test_tie_prefers_weekly() {
        let time = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        let schedule = Schedule::new(time, Some((Weekday::Thu, time)));
        let next = schedule.next_run_after(at(2024, 1, 3, 12, 0));
        assert_eq!(next, ScheduledRun { at: at(2024, 1, 4, 2, 0), kind: RunKind::Weekly });
    }

    #[test]
    fn test_blank_weekly_day_disables_weekly() {
        let config = ScheduleConfig {
            weekly_day: String::new(),
            ..ScheduleConfig::default()
        };
        let schedule = Schedule::from_config(&config).unwrap();
        let next = schedule.next_run_after(at(2024, 1, 7, 2, 30));
        assert_eq!(next.kind, RunKind::Daily);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_time = ScheduleConfig {
            daily_at: "25:99".to_string(),
            ..ScheduleConfig::default()
        };
        assert!(Schedule::from_config(&bad_time).is_err());

        let bad_day = ScheduleConfig {
            weekly_day: "Funday".to_string(),
            ..ScheduleConfig::default()
        };
        assert!(Schedule::from_config(&bad_day).is_err());
    }
}
