//! Expiration math shared by the backends that track TTL themselves
//!
//! Time comes from a [`Clock`] so that expiry can be driven by a
//! [`ManualClock`] in tests instead of sleeping.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

/// Stored in the document store's `expires` field for entries that never expire.
pub const NEVER_EXPIRES: f64 = -1.0;

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
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

    /// Start at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Some(next) = chrono::Duration::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
        {
            *now = next;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Absolute expiration of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    At(DateTime<Utc>),
}

impl Expiration {
    /// Expiration `seconds` from `now`; zero or negative means never.
    pub fn after_seconds(now: DateTime<Utc>, seconds: i64) -> Self {
        if seconds <= 0 {
            return Expiration::Never;
        }
        // Beyond the representable range the entry outlives any clock
        let at = chrono::Duration::try_seconds(seconds).and_then(|delta| now.checked_add_signed(delta));
        match at {
            Some(at) => Expiration::At(at),
            None => Expiration::Never,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        compute_ttl(*self, now).is_expired()
    }

    /// Epoch seconds as stored by the document backend
    pub fn to_timestamp(&self) -> f64 {
        match self {
            Expiration::Never => NEVER_EXPIRES,
            Expiration::At(at) => at.timestamp_millis() as f64 / 1000.0,
        }
    }

    /// Inverse of [`Expiration::to_timestamp`]. Any negative value reads as never.
    pub fn from_timestamp(timestamp: f64) -> Self {
        if timestamp < 0.0 || !timestamp.is_finite() {
            return Expiration::Never;
        }
        match Utc.timestamp_millis_opt((timestamp * 1000.0).round() as i64) {
            chrono::LocalResult::Single(at) => Expiration::At(at),
            _ => Expiration::Never,
        }
    }
}

/// Remaining lifetime of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Never,
    /// `Duration::ZERO` means the entry has expired
    Remaining(Duration),
}

impl Ttl {
    pub fn is_never(&self) -> bool {
        matches!(self, Ttl::Never)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Ttl::Remaining(d) if d.is_zero())
    }

    /// Remaining time, `None` for entries that never expire
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::Remaining(d) => Some(*d),
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => write!(f, "never"),
            Ttl::Remaining(d) => write!(f, "{:.3}s", d.as_secs_f64()),
        }
    }
}

/// `expires_at - now`, clamped at zero. `Never` stays `Never` whatever `now` is.
pub fn compute_ttl(expires_at: Expiration, now: DateTime<Utc>) -> Ttl {
    match expires_at {
        Expiration::Never => Ttl::Never,
        Expiration::At(at) => Ttl::Remaining((at - now).to_std().unwrap_or(Duration::ZERO)),
    }
}
