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

use core::fmt;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink, LogAuditSink};
use crate::cert::Certificate;
use crate::chain::ChainValidator;
use crate::config::FederationConfig;
use crate::error::PkiError;
use crate::federation::Federation;
use crate::fetch::{FetchTimeouts, HttpFetch, ReqwestFetcher};
use crate::intermediate::{
    InMemoryIntermediateCache, IntermediateCertificateCache, IntermediateResolver,
};
use crate::retry::RetryPolicy;
use crate::revocation::{
    CertificateStatus, CrlCache, InMemoryCrlCache, RevocationChecker, RevocationPolicy,
};
use crate::time::{Clock, SystemClock};

/// A federation's certification authority: decides whether certificates
/// presented to the federation are trusted.
///
/// Safe to share between threads.
pub struct CertificationAuthority {
    ca_name: String,
    validator: ChainValidator,
    audit: Arc<dyn AuditSink>,
}

impl CertificationAuthority {
    /// Start configuring an authority for `federation`.
    pub fn builder(federation: Federation) -> CertificationAuthorityBuilder {
        CertificationAuthorityBuilder::new(federation)
    }

    /// Build an authority from deserialized settings, with in-memory caches,
    /// the system clock, a `reqwest` fetcher and a [`LogAuditSink`].
    pub fn from_config(config: &FederationConfig) -> Result<Self, PkiError> {
        Self::builder(config.federation()?)
            .with_revocation_policy(config.revocation.policy()?)
            .with_fetch_timeouts(config.revocation.timeouts()?)
            .with_retry_policy(config.revocation.retry_policy())
            .build()
    }

    /// Display name of the certification authority.
    pub fn ca_name(&self) -> &str {
        &self.ca_name
    }

    /// The chain validator.
    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// Whether `cert` is trusted. Errors count as untrusted.
    pub fn is_valid(&self, cert: &Certificate) -> bool {
        matches!(self.certificate_status(cert), Ok(status) if status.is_valid())
    }

    /// Evaluate `cert` and record exactly one outcome audit event.
    pub fn certificate_status(&self, cert: &Certificate) -> Result<CertificateStatus, PkiError> {
        let result = self.validator.certificate_status(cert);
        let event = match &result {
            Ok(status) => AuditEvent::CertificateValidated {
                subject: cert.subject().to_string(),
                serial: cert.serial_hex(),
                valid: status.is_valid(),
                timestamp: status.timestamp(),
            },
            Err(e) => AuditEvent::CertificateValidationFailed {
                subject: cert.subject().to_string(),
                serial: cert.serial_hex(),
                reason: e.to_string(),
            },
        };
        self.audit.record(&event);
        result
    }

    /// Decode a Base64 or PEM certificate and evaluate it.
    pub fn certificate_status_base64(&self, encoded: &str) -> Result<CertificateStatus, PkiError> {
        let cert = Certificate::from_base64(encoded)?;
        self.certificate_status(&cert)
    }
}

impl fmt::Debug for CertificationAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificationAuthority")
            .field("ca_name", &self.ca_name)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

/// Builds a [`CertificationAuthority`]. Every collaborator has a default.
pub struct CertificationAuthorityBuilder {
    federation: Federation,
    policy: RevocationPolicy,
    crl_cache: Option<Arc<dyn CrlCache>>,
    intermediate_cache: Option<Arc<dyn IntermediateCertificateCache>>,
    fetcher: Option<Arc<dyn HttpFetch>>,
    timeouts: FetchTimeouts,
    retry: RetryPolicy,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl CertificationAuthorityBuilder {
    /// Create a builder for `federation` using the default
    /// [`RevocationPolicy`], which is not strict.
    pub fn new(federation: Federation) -> Self {
        Self {
            federation,
            policy: RevocationPolicy::default(),
            crl_cache: None,
            intermediate_cache: None,
            fetcher: None,
            timeouts: FetchTimeouts::default(),
            retry: RetryPolicy::none(),
            clock: None,
            audit: None,
        }
    }

    /// Customize the revocation policy.
    pub fn with_revocation_policy(mut self, policy: RevocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share a CRL cache with other authorities or keep it elsewhere.
    pub fn with_crl_cache(mut self, cache: Arc<dyn CrlCache>) -> Self {
        self.crl_cache = Some(cache);
        self
    }

    /// Customize where intermediates are kept.
    pub fn with_intermediate_cache(mut self, cache: Arc<dyn IntermediateCertificateCache>) -> Self {
        self.intermediate_cache = Some(cache);
        self
    }

    /// Customize how CRLs and intermediates are downloaded. Replaces the
    /// default `reqwest` fetcher, so [`Self::with_fetch_timeouts`] no longer
    /// applies.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Customize the default fetcher's timeouts.
    pub fn with_fetch_timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Customize how transient download failures are retried.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Customize the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Customize where audit events go.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Construct the authority.
    pub fn build(self) -> Result<CertificationAuthority, PkiError> {
        let root = self.federation.root();
        if !root.is_ca() {
            return Err(PkiError::Config(format!(
                "root certificate {} is not a CA certificate",
                root.subject()
            )));
        }

        let fetcher: Arc<dyn HttpFetch> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(self.timeouts).map_err(|e| {
                PkiError::Config(format!("HTTP client cannot be built: {}", e))
            })?),
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let audit: Arc<dyn AuditSink> = self
            .audit
            .unwrap_or_else(|| Arc::new(LogAuditSink::new(self.federation.ca_name())));
        let crl_cache: Arc<dyn CrlCache> = self
            .crl_cache
            .unwrap_or_else(|| Arc::new(InMemoryCrlCache::new()));
        let intermediate_cache: Arc<dyn IntermediateCertificateCache> = self
            .intermediate_cache
            .unwrap_or_else(|| Arc::new(InMemoryIntermediateCache::new()));

        let revocation = RevocationChecker::new(
            self.policy,
            crl_cache,
            Arc::clone(&fetcher),
            Arc::clone(&clock),
            Arc::clone(&audit),
        )
        .with_retry_policy(self.retry);
        let resolver = IntermediateResolver::new(
            intermediate_cache,
            fetcher,
            self.retry,
            self.federation.aia_prefix().map(str::to_owned),
        );

        Ok(CertificationAuthority {
            ca_name: self.federation.ca_name().to_owned(),
            validator: ChainValidator::new(self.federation, resolver, revocation, clock),
            audit,
        })
    }
}
