//! Configuration Module
//!
//! TTL validation and environment-driven settings for memoized functions.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MemoError, Result};

// == Ttl ==
/// Maximum age of a cached entry, fixed when a function is wrapped.
///
/// A `Duration` cannot be negative, so converting from one never fails.
/// The fallible constructors reject negative, non-finite and non-numeric
/// input eagerly, before any wrapper exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ttl(Duration);

impl Ttl {
    /// A TTL of zero: every call is a miss.
    pub const ZERO: Ttl = Ttl(Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Builds a TTL from fractional seconds.
    ///
    /// # Errors
    /// `MemoError::InvalidTtl` if `secs` is negative, NaN, infinite or too
    /// large to represent.
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        Duration::try_from_secs_f64(secs)
            .map(Self)
            .map_err(|e| MemoError::InvalidTtl(format!("{secs}: {e}")))
    }

    pub const fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl FromStr for Ttl {
    type Err = MemoError;

    /// Parses a number of seconds, e.g. `"5"` or `"0.25"`.
    fn from_str(s: &str) -> Result<Self> {
        let secs: f64 = s
            .trim()
            .parse()
            .map_err(|_| MemoError::InvalidTtl(format!("not a number: {s:?}")))?;
        Self::from_secs_f64(secs)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// == Memo Config ==
/// Settings for a memoized function.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoConfig {
    /// How long a computed value stays fresh
    pub ttl: Ttl,
    /// Interval of the background sweep, None = never sweep
    pub sweep_interval: Option<Duration>,
}

impl MemoConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_TTL_SECS` - TTL in seconds, fractional allowed (default: 300)
    /// - `MEMO_SWEEP_INTERVAL_SECS` - Sweep interval in seconds (default: unset, 0 disables)
    ///
    /// # Errors
    /// Malformed values are rejected rather than replaced by defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ttl = match lookup("MEMO_TTL_SECS") {
            Some(raw) => raw.parse::<Ttl>()?,
            None => Self::default().ttl,
        };

        let sweep_interval = match lookup("MEMO_SWEEP_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    MemoError::InvalidConfig(format!(
                        "MEMO_SWEEP_INTERVAL_SECS must be a whole number of seconds, got {raw:?}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            ttl,
            sweep_interval,
        })
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            ttl: Ttl::from_secs(300),
            sweep_interval: None,
        }
    }
}
