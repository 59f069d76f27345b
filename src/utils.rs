//! Utility functions and the injectable clock

use crate::error::LadderError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Injectable UTC time source, so expiry and cooldown logic is
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for testing
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Parse a user-supplied duration. Accepts `HH:MM` as well as suffixed
/// forms like `90m`, `2h` and `1h30m`.
pub fn parse_duration(input: &str) -> crate::error::Result<Duration> {
    let trimmed = input.trim();

    if let Some((hours, minutes)) = trimmed.split_once(':') {
        let hours: i64 = hours.parse().map_err(|_| LadderError::ValidationError {
            reason: format!("'{trimmed}' is not a valid duration, expected HH:MM"),
        })?;
        let minutes: i64 = minutes.parse().map_err(|_| LadderError::ValidationError {
            reason: format!("'{trimmed}' is not a valid duration, expected HH:MM"),
        })?;
        if hours < 0 || !(0..60).contains(&minutes) {
            return Err(LadderError::ValidationError {
                reason: format!("'{trimmed}' is not a valid duration, expected HH:MM"),
            }
            .into());
        }
        return Ok(Duration::hours(hours) + Duration::minutes(minutes));
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut matched = false;
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: i64 = digits.parse().map_err(|_| LadderError::ValidationError {
            reason: format!("'{trimmed}' is not a valid duration"),
        })?;
        digits.clear();
        total = match ch.to_ascii_lowercase() {
            'h' => total + Duration::hours(value),
            'm' => total + Duration::minutes(value),
            _ => {
                return Err(LadderError::ValidationError {
                    reason: format!("'{trimmed}' is not a valid duration"),
                }
                .into())
            }
        };
        matched = true;
    }

    if !digits.is_empty() || !matched {
        return Err(LadderError::ValidationError {
            reason: format!("'{trimmed}' is not a valid duration"),
        }
        .into());
    }

    Ok(total)
}

/// Render a duration as a compact `XhYm` string for event payloads and logs
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
