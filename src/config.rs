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

//! Deserializable settings and their validation into typed policies.

use std::time::Duration;

use serde::Deserialize;

use crate::cert::Certificate;
use crate::error::PkiError;
use crate::federation::{Environment, Federation};
use crate::fetch::FetchTimeouts;
use crate::retry::RetryPolicy;
use crate::revocation::{RefreshInterval, RevocationPolicy, RevocationPolicyBuilder};

/// Revocation and fetch settings. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevocationConfig {
    /// Seconds between CRL revalidations. `0` downloads on every check and
    /// `-1` only downloads when nothing is cached.
    pub interval_secs: i64,
    /// Whether a certificate whose revocation status cannot be established
    /// is rejected. Defaults to `false`.
    pub strict: bool,
    /// Seconds past a CRL's nextUpdate during which it remains usable.
    pub crl_ttl_secs: i64,
    /// Connect timeout for CRL and intermediate downloads.
    pub connect_timeout_ms: u64,
    /// Read timeout for CRL and intermediate downloads.
    pub read_timeout_ms: u64,
    /// Attempts per download, including the first.
    pub retry_attempts: u32,
    /// Base delay between download attempts.
    pub retry_backoff_ms: u64,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            strict: false,
            crl_ttl_secs: 3600,
            connect_timeout_ms: 3000,
            read_timeout_ms: 3000,
            retry_attempts: 1,
            retry_backoff_ms: 250,
        }
    }
}

impl RevocationConfig {
    /// Validate into a [`RevocationPolicy`].
    pub fn policy(&self) -> Result<RevocationPolicy, PkiError> {
        let ttl = chrono::Duration::try_seconds(self.crl_ttl_secs).ok_or_else(|| {
            PkiError::Config(format!("CRL TTL {} is out of range", self.crl_ttl_secs))
        })?;
        RevocationPolicyBuilder::new()
            .with_interval(RefreshInterval::from_secs(self.interval_secs)?)
            .with_strict(self.strict)
            .with_ttl(ttl)
            .build()
    }

    /// Validate into [`FetchTimeouts`]. Zero timeouts are rejected.
    pub fn timeouts(&self) -> Result<FetchTimeouts, PkiError> {
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(PkiError::Config(
                "connect and read timeouts must be positive".to_owned(),
            ));
        }
        Ok(FetchTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
        })
    }

    /// The retry policy for downloads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

/// Settings for one federation's certification authority.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederationConfig {
    /// Production or test.
    #[serde(default)]
    pub environment: Environment,
    /// The root certificate, Base64 or PEM.
    pub root_certificate: String,
    /// Overrides the environment's CA display name.
    #[serde(default)]
    pub ca_name: Option<String>,
    /// Overrides the environment's caIssuers namespace. Intermediates are
    /// only fetched from URLs with this prefix.
    #[serde(default)]
    pub aia_prefix: Option<String>,
    /// Revocation settings.
    #[serde(default)]
    pub revocation: RevocationConfig,
}

impl FederationConfig {
    /// Decode the root and build the [`Federation`].
    pub fn federation(&self) -> Result<Federation, PkiError> {
        let root = Certificate::from_base64(&self.root_certificate).map_err(|e| {
            PkiError::Config(format!("root certificate cannot be decoded: {}", e))
        })?;

        let ca_name = self
            .ca_name
            .as_deref()
            .unwrap_or(self.environment.ca_name());
        let aia_prefix = self
            .aia_prefix
            .as_deref()
            .unwrap_or(self.environment.aia_prefix());
        Ok(Federation::new(ca_name, root).with_aia_prefix(aia_prefix))
    }
}
