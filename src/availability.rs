//! Open-now evaluation of a weekly schedule.
//!
//! Core rule: a day is open on the half-open interval `[open, close)`.
//! A missing day, a null bound, or an unparseable time all mean closed.
//! Windows whose close precedes their open (overnight) are governed by
//! [`OvernightPolicy`].

use crate::center::{DayHours, TimeWindow, WeeklySchedule};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Clock ──────────────────────────────────────────────────────

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock, read in a fixed IANA time zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let utc: DateTime<Utc> = Utc::now();
        utc.with_timezone(&self.tz).naive_local()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

// ─── Overnight handling ─────────────────────────────────────────

/// What to do with a day whose `close` is earlier than its `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvernightPolicy {
    /// The window is treated as closed all day.
    #[default]
    Closed,
    /// The window runs from `open` until `close` on the following day.
    Wraparound,
}

impl fmt::Display for OvernightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Wraparound => write!(f, "wraparound"),
        }
    }
}

impl FromStr for OvernightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "closed" => Ok(Self::Closed),
            "wraparound" | "wrap" => Ok(Self::Wraparound),
            _ => Err(format!("Unknown overnight policy '{}'. Use 'closed' or 'wraparound'.", s)),
        }
    }
}

// ─── Evaluation ─────────────────────────────────────────────────

/// Result of evaluating one schedule at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_open: bool,
    pub today_window: Option<TimeWindow>,
}

impl Availability {
    fn without_window(is_open: bool) -> Self {
        Self { is_open, today_window: None }
    }
}

/// Parsed `[open, close)` bounds in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    open: u32,
    close: u32,
}

impl Window {
    fn from_hours(hours: &DayHours) -> Option<Self> {
        let open = parse_hhmm(hours.open.as_deref()?)?;
        let close = parse_hhmm(hours.close.as_deref()?)?;
        Some(Self { open, close })
    }

    fn is_overnight(&self) -> bool {
        self.close < self.open
    }
}

/// Parse "H:MM" / "HH:MM" (an optional ":SS" suffix is ignored) into minutes
/// since midnight.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let mut parts = s.trim().split(':');
    let h: u32 = parts.next()?.trim().parse().ok()?;
    let m_raw = parts.next()?.trim();
    if m_raw.len() != 2 {
        return None;
    }
    let m: u32 = m_raw.parse().ok()?;
    if let Some(sec) = parts.next() {
        sec.trim().parse::<u32>().ok().filter(|s| *s < 60)?;
    }
    if parts.next().is_some() || h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Evaluates weekly schedules against the time supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityEvaluator {
    overnight: OvernightPolicy,
}

impl AvailabilityEvaluator {
    pub fn new(overnight: OvernightPolicy) -> Self {
        Self { overnight }
    }

    pub fn overnight_policy(&self) -> OvernightPolicy {
        self.overnight
    }

    /// Evaluate `schedule` at local time `now`.
    pub fn is_open_now(&self, schedule: &WeeklySchedule, now: NaiveDateTime) -> Availability {
        let today = now.weekday();
        let now_min = now.hour() * 60 + now.minute();
        let carried = self.overnight == OvernightPolicy::Wraparound
            && self.carried_over(schedule, today.pred(), now_min);

        let Some(hours) = schedule.day(today) else {
            return Availability::without_window(carried);
        };
        let Some(window) = Window::from_hours(hours) else {
            tracing::debug!(day = %today, ?hours, "unusable schedule entry, treating as closed");
            return Availability::without_window(carried);
        };

        // Both bounds parsed, so the raw strings are present.
        let today_window = Some(TimeWindow {
            open: hours.open.clone().unwrap_or_default(),
            close: hours.close.clone().unwrap_or_default(),
        });

        let is_open = if window.is_overnight() {
            match self.overnight {
                OvernightPolicy::Closed => false,
                OvernightPolicy::Wraparound => now_min >= window.open || carried,
            }
        } else {
            (window.open <= now_min && now_min < window.close) || carried
        };

        Availability { is_open, today_window }
    }

    /// Whether yesterday's overnight window still covers `now_min` today.
    fn carried_over(&self, schedule: &WeeklySchedule, yesterday: Weekday, now_min: u32) -> bool {
        schedule
            .day(yesterday)
            .and_then(Window::from_hours)
            .is_some_and(|w| w.is_overnight() && now_min < w.close)
    }
}

/// Convenience wrapper using the default (closed) overnight policy.
pub fn is_open_now(schedule: &WeeklySchedule, now: NaiveDateTime) -> Availability {
    AvailabilityEvaluator::default().is_open_now(schedule, now)
}
