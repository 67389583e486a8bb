// Copyright 2015 Brian Smith.
//
// Permission to use, copy, modify, and/or distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHORS DISCLAIM ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHORS BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

use chrono::Duration;

use crate::error::PkiError;

/// How often a cached CRL is revalidated with its distribution point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshInterval {
    /// Download on every check.
    Always,
    /// Only download when nothing is cached for a distribution point.
    Never,
    /// Download once the cached entry is older than the given duration.
    Every(Duration),
}

impl RefreshInterval {
    /// Reserved configuration value for [`RefreshInterval::Always`].
    pub const ALWAYS_SECS: i64 = 0;
    /// Reserved configuration value for [`RefreshInterval::Never`].
    pub const NEVER_SECS: i64 = -1;

    /// Interpret an interval in seconds, honouring the reserved values.
    ///
    /// Negative values other than [`Self::NEVER_SECS`] are rejected.
    pub fn from_secs(secs: i64) -> Result<Self, PkiError> {
        match secs {
            Self::ALWAYS_SECS => Ok(Self::Always),
            Self::NEVER_SECS => Ok(Self::Never),
            secs if secs > 0 => Duration::try_seconds(secs)
                .map(Self::Every)
                .ok_or_else(|| PkiError::Config(format!("refresh interval {} is out of range", secs))),
            secs => Err(PkiError::Config(format!(
                "refresh interval must be positive, {} (always) or {} (never), got {}",
                Self::ALWAYS_SECS,
                Self::NEVER_SECS,
                secs
            ))),
        }
    }
}

/// Builds a [`RevocationPolicy`].
#[derive(Clone, Copy, Debug)]
pub struct RevocationPolicyBuilder {
    interval: RefreshInterval,
    strict: bool,
    ttl: Duration,
}

impl RevocationPolicyBuilder {
    /// Create a builder with the defaults: refresh hourly, one hour of grace
    /// past nextUpdate, and non-strict.
    ///
    /// Non-strict means a certificate whose revocation status cannot be
    /// established is still reported valid, with
    /// [`StatusTimestamp::Unknown`](crate::StatusTimestamp::Unknown). Use
    /// [`RevocationPolicyBuilder::with_strict`] to fail instead.
    pub fn new() -> Self {
        Self {
            interval: RefreshInterval::Every(Duration::hours(1)),
            strict: false,
            ttl: Duration::hours(1),
        }
    }

    /// Customize how often cached CRLs are revalidated.
    pub fn with_interval(mut self, interval: RefreshInterval) -> Self {
        self.interval = interval;
        self
    }

    /// Customize whether missing revocation evidence is an error.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Customize how long past nextUpdate a CRL remains usable.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Construct a [`RevocationPolicy`], rejecting a negative TTL.
    pub fn build(self) -> Result<RevocationPolicy, PkiError> {
        if self.ttl < Duration::zero() {
            return Err(PkiError::Config(format!(
                "CRL TTL must not be negative, got {}s",
                self.ttl.num_seconds()
            )));
        }
        Ok(RevocationPolicy {
            interval: self.interval,
            strict: self.strict,
            ttl: self.ttl,
        })
    }
}

impl Default for RevocationPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Controls when CRLs are downloaded and what happens when none is usable.
/// Constructed with a [`RevocationPolicyBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevocationPolicy {
    pub(crate) interval: RefreshInterval,
    pub(crate) strict: bool,
    pub(crate) ttl: Duration,
}

impl RevocationPolicy {
    /// The refresh interval.
    pub fn interval(&self) -> RefreshInterval {
        self.interval
    }

    /// Whether missing revocation evidence is an error.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Grace period past a CRL's nextUpdate.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for RevocationPolicy {
    fn default() -> Self {
        Self {
            interval: RefreshInterval::Every(Duration::hours(1)),
            strict: false,
            ttl: Duration::hours(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_sentinels() {
        assert_eq!(RefreshInterval::from_secs(0).unwrap(), RefreshInterval::Always);
        assert_eq!(RefreshInterval::from_secs(-1).unwrap(), RefreshInterval::Never);
        assert_eq!(
            RefreshInterval::from_secs(90).unwrap(),
            RefreshInterval::Every(Duration::seconds(90))
        );
    }

    #[test]
    fn other_negative_intervals_are_rejected() {
        assert!(matches!(
            RefreshInterval::from_secs(-2),
            Err(PkiError::Config(_))
        ));
    }

    #[test]
    fn negative_ttl_is_rejected() {
        let result = RevocationPolicyBuilder::new()
            .with_ttl(Duration::seconds(-5))
            .build();
        assert!(matches!(result, Err(PkiError::Config(_))));
    }

    #[test]
    fn builder_defaults_match_default_policy() {
        let policy = RevocationPolicyBuilder::new().build().unwrap();
        assert_eq!(policy, RevocationPolicy::default());
        assert!(!policy.is_strict());
    }
}
