//! Elapsed simulated time.

use std::{fmt, ops};

use serde::{Deserialize, Serialize};
use time::Duration;

/// Simulated time elapsed since the simulation started, i.e. the sum of
/// every tick's scaled delta.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SimTime(Duration);

impl SimTime {
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    pub fn new_seconds(sec: f64) -> Self {
        Self(Duration::saturating_seconds_f64(sec))
    }

    pub fn into_duration(self) -> Duration {
        self.0
    }

    pub fn as_seconds(self) -> f64 {
        self.0.as_seconds_f64()
    }

    /// Advance by `sec` seconds, saturating instead of overflowing on
    /// pathological deltas.
    #[must_use]
    pub fn advanced(self, sec: f64) -> Self {
        Self(self.0.saturating_add(Duration::saturating_seconds_f64(sec)))
    }

    pub fn days(self) -> i64 {
        self.0.whole_days()
    }

    pub fn hours(self) -> u8 {
        (self.0.whole_hours() % 24).unsigned_abs() as u8
    }

    pub fn minutes(self) -> u8 {
        (self.0.whole_minutes() % 60).unsigned_abs() as u8
    }

    pub fn seconds(self) -> u8 {
        (self.0.whole_seconds() % 60).unsigned_abs() as u8
    }

    pub fn millis(self) -> u16 {
        (self.0.whole_milliseconds() % 1000).unsigned_abs() as u16
    }
}

impl ops::Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days() > 0 {
            write!(
                f,
                "T+{}:{:02}:{:02}:{:02}.{:>03}",
                self.days(),
                self.hours(),
                self.minutes(),
                self.seconds(),
                self.millis()
            )
        } else {
            write!(
                f,
                "T+{:02}:{:02}:{:02}.{:>03}",
                self.hours(),
                self.minutes(),
                self.seconds(),
                self.millis()
            )
        }
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({}s)", self.0.as_seconds_f64())
    }
}

#[test]
fn formats_elapsed_time() {
    let t = SimTime::ZERO.advanced(3661.25);
    assert_eq!(t.to_string(), "T+01:01:01.250");
    let t = t + Duration::days(2);
    assert_eq!(t.to_string(), "T+2:01:01:01.250");
    assert!((SimTime::new_seconds(1.5).as_seconds() - 1.5).abs() < 1e-9);
}

#[test]
fn saturates_on_huge_deltas() {
    let t = SimTime::ZERO.advanced(f64::MAX).advanced(1.0);
    assert_eq!(t.into_duration(), Duration::MAX);
}
