//! Cache Policy Module
//!
//! Maps the closed set of refresh policies to the action a repository
//! registers at construction.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Policy ==
/// Refresh policy of a cache repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CachePolicy {
    /// The value is never cached.
    DoNotCache,
    /// The value is cached and never reset automatically.
    NoReset,
    StaleAfterFiveSeconds,
    StaleAfterTenSeconds,
    StaleAfterThirtySeconds,
    StaleAfterOneMinute,
    StaleAfterTwoMinutes,
    StaleAfterFiveMinutes,
    StaleAfterTenMinutes,
    StaleAfterFifteenMinutes,
    StaleAfterThirtyMinutes,
    StaleAfterOneHour,
}

// == Refresh ==
/// What a policy asks the repository to do over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Caching is off; every operation is a no-op.
    Disabled,
    /// Values stay cached; no periodic callback.
    NoTimer,
    /// Periodic callback fires at this interval.
    Every(Duration),
}

impl CachePolicy {
    /// Every policy, in declaration order.
    pub const ALL: [CachePolicy; 12] = [
        CachePolicy::DoNotCache,
        CachePolicy::NoReset,
        CachePolicy::StaleAfterFiveSeconds,
        CachePolicy::StaleAfterTenSeconds,
        CachePolicy::StaleAfterThirtySeconds,
        CachePolicy::StaleAfterOneMinute,
        CachePolicy::StaleAfterTwoMinutes,
        CachePolicy::StaleAfterFiveMinutes,
        CachePolicy::StaleAfterTenMinutes,
        CachePolicy::StaleAfterFifteenMinutes,
        CachePolicy::StaleAfterThirtyMinutes,
        CachePolicy::StaleAfterOneHour,
    ];

    // == Refresh Resolver ==
    /// Resolves the policy to its refresh action.
    pub fn refresh(self) -> Refresh {
        let millis = match self {
            CachePolicy::DoNotCache => return Refresh::Disabled,
            CachePolicy::NoReset => return Refresh::NoTimer,
            CachePolicy::StaleAfterFiveSeconds => 5_000,
            CachePolicy::StaleAfterTenSeconds => 10_000,
            CachePolicy::StaleAfterThirtySeconds => 30_000,
            CachePolicy::StaleAfterOneMinute => 60_000,
            CachePolicy::StaleAfterTwoMinutes => 120_000,
            CachePolicy::StaleAfterFiveMinutes => 300_000,
            CachePolicy::StaleAfterTenMinutes => 600_000,
            CachePolicy::StaleAfterFifteenMinutes => 900_000,
            CachePolicy::StaleAfterThirtyMinutes => 1_800_000,
            CachePolicy::StaleAfterOneHour => 3_600_000,
        };
        Refresh::Every(Duration::from_millis(millis))
    }

    /// True iff the policy means "do not cache".
    pub fn is_disabled(self) -> bool {
        self.refresh() == Refresh::Disabled
    }

    /// Interval of the periodic callback, if the policy has one.
    pub fn interval(self) -> Option<Duration> {
        match self.refresh() {
            Refresh::Every(period) => Some(period),
            Refresh::Disabled | Refresh::NoTimer => None,
        }
    }

    /// Short tag used in configuration and API payloads.
    pub fn tag(self) -> &'static str {
        match self {
            CachePolicy::DoNotCache => "disabled",
            CachePolicy::NoReset => "never",
            CachePolicy::StaleAfterFiveSeconds => "5s",
            CachePolicy::StaleAfterTenSeconds => "10s",
            CachePolicy::StaleAfterThirtySeconds => "30s",
            CachePolicy::StaleAfterOneMinute => "1m",
            CachePolicy::StaleAfterTwoMinutes => "2m",
            CachePolicy::StaleAfterFiveMinutes => "5m",
            CachePolicy::StaleAfterTenMinutes => "10m",
            CachePolicy::StaleAfterFifteenMinutes => "15m",
            CachePolicy::StaleAfterThirtyMinutes => "30m",
            CachePolicy::StaleAfterOneHour => "1h",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CachePolicy::ALL
            .into_iter()
            .find(|policy| policy.tag().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown cache policy '{}'", wanted))
    }
}

impl TryFrom<String> for CachePolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CachePolicy> for String {
    fn from(policy: CachePolicy) -> Self {
        policy.tag().to_string()
    }
}
