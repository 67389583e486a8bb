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

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::cert::Certificate;
use crate::crl::CertRevocationList;
use crate::error::{Error, PkiError};
use crate::fetch::{FetchError, FetchResponse, HttpFetch};
use crate::retry::RetryPolicy;
use crate::time::Clock;

mod cache;
mod policy;

pub use cache::{CrlCache, CrlInfo, InMemoryCrlCache, VerificationState};
pub use policy::{RefreshInterval, RevocationPolicy, RevocationPolicyBuilder};

/// The "as of" time attached to a [`CertificateStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusTimestamp {
    /// The thisUpdate of the CRL the verdict rests on.
    AsOf(DateTime<Utc>),
    /// No CRL could be consulted; the verdict carries no revocation
    /// guarantee.
    Unknown,
}

/// The outcome of evaluating a certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CertificateStatus {
    valid: bool,
    timestamp: Option<StatusTimestamp>,
}

impl CertificateStatus {
    pub(crate) fn new(valid: bool, timestamp: Option<StatusTimestamp>) -> Self {
        Self { valid, timestamp }
    }

    /// Whether the certificate is trusted.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The revocation evidence time, or `None` when revocation was never
    /// evaluated (for example because the certificate is out of date).
    pub fn timestamp(&self) -> Option<StatusTimestamp> {
        self.timestamp
    }

    /// Whether the verdict is backed by a verified CRL.
    pub fn has_revocation_evidence(&self) -> bool {
        matches!(self.timestamp, Some(StatusTimestamp::AsOf(_)))
    }
}

/// Answers "is this certificate revoked, and as of when" from CRLs fetched
/// through an [`HttpFetch`] and kept in a [`CrlCache`].
pub struct RevocationChecker {
    policy: RevocationPolicy,
    cache: Arc<dyn CrlCache>,
    fetcher: Arc<dyn HttpFetch>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl RevocationChecker {
    /// Assemble a checker from its collaborators.
    pub fn new(
        policy: RevocationPolicy,
        cache: Arc<dyn CrlCache>,
        fetcher: Arc<dyn HttpFetch>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy,
            cache,
            fetcher,
            retry: RetryPolicy::none(),
            clock,
            audit,
        }
    }

    /// Customize how transient download failures are retried.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The policy in effect.
    pub fn policy(&self) -> &RevocationPolicy {
        &self.policy
    }

    /// The CRL cache.
    pub fn cache(&self) -> &Arc<dyn CrlCache> {
        &self.cache
    }

    /// Determine whether `issuer` has revoked `cert`.
    ///
    /// Only fails under a strict policy, when no usable CRL can be
    /// established. Download and verification problems are otherwise logged,
    /// audited and treated as missing evidence.
    pub fn revocation_status(
        &self,
        cert: &Certificate,
        issuer: &Certificate,
    ) -> Result<CertificateStatus, PkiError> {
        let Some(url) = cert.crl_distribution_point() else {
            debug!("{} names no http(s) CRL distribution point", cert.subject());
            return self.no_evidence(cert, None);
        };

        let now = self.clock.now();
        let info = match self.cache.get(url) {
            Some(info) if !self.needs_download(&info, now) => {
                debug!("using cached CRL for {}", url);
                Some(info)
            }
            cached => self.download(url, cached, now),
        };

        let usable = info.and_then(|info| self.usable(url, info, issuer, now));
        match usable {
            Some(info) => {
                let revoked = info.crl.find_serial(cert.serial());
                if let Some(entry) = revoked {
                    info!(
                        "{} (serial {}) is revoked since {}",
                        cert.subject(),
                        cert.serial_hex(),
                        entry.revocation_date.to_rfc3339()
                    );
                }
                Ok(CertificateStatus::new(
                    revoked.is_none(),
                    Some(StatusTimestamp::AsOf(info.crl.this_update())),
                ))
            }
            None => self.no_evidence(cert, Some(url)),
        }
    }

    fn needs_download(&self, info: &CrlInfo, now: DateTime<Utc>) -> bool {
        match self.policy.interval {
            RefreshInterval::Never => false,
            RefreshInterval::Always => true,
            RefreshInterval::Every(interval) => {
                info.crl.is_expired(now, self.policy.ttl) || now - info.created > interval
            }
        }
    }

    fn download(
        &self,
        url: &str,
        cached: Option<CrlInfo>,
        now: DateTime<Utc>,
    ) -> Option<CrlInfo> {
        let since = cached.as_ref().map(|info| info.last_modified);
        info!("downloading CRL from {}", url);
        let response = self
            .retry
            .run(|| self.fetcher.fetch(url, since), FetchError::is_transient);

        let info = match (response, cached) {
            (Ok(FetchResponse::NotModified), Some(cached)) => {
                debug!("CRL at {} not modified", url);
                cached.revalidated(now)
            }
            (Ok(FetchResponse::NotModified), None) => {
                return self.download_failed(url, "not modified, but nothing is cached");
            }
            (
                Ok(FetchResponse::Modified {
                    body,
                    last_modified,
                }),
                cached,
            ) => match cached {
                Some(cached) if cached.crl.der() == &body[..] => {
                    debug!("CRL at {} unchanged", url);
                    CrlInfo {
                        last_modified: last_modified.unwrap_or(cached.last_modified),
                        ..cached.revalidated(now)
                    }
                }
                _ => match CertRevocationList::from_der(&body) {
                    Ok(crl) => {
                        let last_modified = last_modified.unwrap_or_else(|| crl.this_update());
                        CrlInfo::unchecked(crl, last_modified, now)
                    }
                    Err(e) => return self.download_failed(url, CrlRejection::Malformed(e)),
                },
            },
            (Err(e), _) => return self.download_failed(url, e),
        };

        self.cache.update(url, Some(info))
    }

    fn download_failed(&self, url: &str, reason: impl fmt::Display) -> Option<CrlInfo> {
        warn!("CRL download from {} failed: {}", url, reason);
        self.cache.update(url, None);
        self.audit.record(&AuditEvent::CrlDownloadFailed {
            url: url.to_owned(),
            reason: reason.to_string(),
        });
        None
    }

    /// Verify an unchecked entry, and apply the expiry check to every entry.
    fn usable(
        &self,
        url: &str,
        info: CrlInfo,
        issuer: &Certificate,
        now: DateTime<Utc>,
    ) -> Option<CrlInfo> {
        // A checked entry was verified for its own issuer only.
        if info.state == VerificationState::Checked && info.crl.issuer() != issuer.subject() {
            warn!(
                "cached CRL from {} is issued by {}, not {}; not using it",
                url,
                info.crl.issuer(),
                issuer.subject()
            );
            return None;
        }

        let rejection = match info.state {
            VerificationState::Checked => self.check_expiry(&info.crl, now).err(),
            VerificationState::Unchecked => self.verify(&info.crl, issuer, now).err(),
        };

        match rejection {
            None if info.state == VerificationState::Unchecked => {
                debug!("CRL from {} verified against {}", url, issuer.subject());
                self.cache.update(url, Some(info.checked()))
            }
            None => Some(info),
            Some(rejection) => {
                warn!("discarding CRL from {}: {}", url, rejection);
                self.cache.update(url, None);
                if let CrlRejection::Expired(next_update) = rejection {
                    self.audit.record(&AuditEvent::CrlExpired {
                        url: url.to_owned(),
                        next_update,
                    });
                }
                None
            }
        }
    }

    fn verify(
        &self,
        crl: &CertRevocationList,
        issuer: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<(), CrlRejection> {
        crl.verify_issued_by(issuer).map_err(CrlRejection::NotIssuedBy)?;
        if crl.is_partitioned() {
            return Err(CrlRejection::Partitioned);
        }
        self.check_expiry(crl, now)
    }

    fn check_expiry(
        &self,
        crl: &CertRevocationList,
        now: DateTime<Utc>,
    ) -> Result<(), CrlRejection> {
        if crl.is_expired(now, self.policy.ttl) {
            return Err(CrlRejection::Expired(crl.next_update()));
        }
        Ok(())
    }

    fn no_evidence(
        &self,
        cert: &Certificate,
        url: Option<&str>,
    ) -> Result<CertificateStatus, PkiError> {
        if self.policy.strict {
            return Err(PkiError::MissingRevocationEvidence {
                subject: cert.subject().to_string(),
                url: url.map(str::to_owned),
            });
        }

        warn!(
            "revocation status of {} (serial {}) is unknown; accepting under non-strict policy",
            cert.subject(),
            cert.serial_hex()
        );
        self.audit.record(&AuditEvent::RevocationCheckSkipped {
            subject: cert.subject().to_string(),
            url: url.map(str::to_owned),
        });
        Ok(CertificateStatus::new(true, Some(StatusTimestamp::Unknown)))
    }
}

impl fmt::Debug for RevocationChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationChecker")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum CrlRejection {
    Malformed(Error),
    NotIssuedBy(Error),
    Partitioned,
    Expired(DateTime<Utc>),
}

impl fmt::Display for CrlRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed CRL: {}", e),
            Self::NotIssuedBy(e) => write!(f, "not issued by the certificate's issuer: {}", e),
            Self::Partitioned => f.write_str("CRL is partitioned by an issuing distribution point"),
            Self::Expired(next_update) => {
                write!(f, "CRL expired (nextUpdate {})", next_update.to_rfc3339())
            }
        }
    }
}
