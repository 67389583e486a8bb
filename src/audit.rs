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

//! Audit events emitted while evaluating certificates.

use core::fmt;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::revocation::StatusTimestamp;

/// How an [`AuditEvent`] should be treated by a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    #[allow(missing_docs)]
    Info,
    #[allow(missing_docs)]
    Warning,
    #[allow(missing_docs)]
    Error,
}

/// Something an operator may want recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuditEvent {
    /// A certificate was evaluated without error. `valid` may still be
    /// false, for a revoked or out-of-date certificate, in which case the
    /// event has [`Severity::Error`].
    CertificateValidated {
        /// Rendered subject DN.
        subject: String,
        /// Serial number in hex.
        serial: String,
        /// The verdict.
        valid: bool,
        /// As-of time of the revocation evidence, if any was consulted.
        timestamp: Option<StatusTimestamp>,
    },

    /// Revocation status could not be established and the policy is not
    /// strict, so the certificate was not rejected.
    RevocationCheckSkipped {
        /// Rendered subject DN.
        subject: String,
        /// The CRL distribution point, if the certificate names one.
        url: Option<String>,
    },

    /// Evaluation ended in an error.
    CertificateValidationFailed {
        /// Rendered subject DN.
        subject: String,
        /// Serial number in hex.
        serial: String,
        /// The error message.
        reason: String,
    },

    /// A CRL could not be downloaded or decoded.
    CrlDownloadFailed {
        /// The distribution point.
        url: String,
        /// The failure.
        reason: String,
    },

    /// A cached or downloaded CRL is past its nextUpdate plus the grace
    /// period.
    CrlExpired {
        /// The distribution point.
        url: String,
        /// The CRL's nextUpdate.
        next_update: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Severity of the event. A certificate evaluated as not valid is a
    /// failed validation and reported as an error.
    pub fn severity(&self) -> Severity {
        match self {
            Self::CertificateValidated { valid: true, .. } => Severity::Info,
            Self::CertificateValidated { valid: false, .. } => Severity::Error,
            Self::RevocationCheckSkipped { .. } => Severity::Warning,
            Self::CertificateValidationFailed { .. }
            | Self::CrlDownloadFailed { .. }
            | Self::CrlExpired { .. } => Severity::Error,
        }
    }

    /// A short stable name for the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CertificateValidated { .. } => "certificate_validated",
            Self::RevocationCheckSkipped { .. } => "revocation_check_skipped",
            Self::CertificateValidationFailed { .. } => "certificate_validation_failed",
            Self::CrlDownloadFailed { .. } => "crl_download_failed",
            Self::CrlExpired { .. } => "crl_expired",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CertificateValidated {
                subject,
                serial,
                valid,
                timestamp,
            } => {
                write!(f, "certificate {} (serial {}) valid={}", subject, serial, valid)?;
                match timestamp {
                    Some(StatusTimestamp::AsOf(time)) => write!(f, " as of {}", time.to_rfc3339()),
                    Some(StatusTimestamp::Unknown) => f.write_str(" revocation status unknown"),
                    None => Ok(()),
                }
            }
            Self::RevocationCheckSkipped { subject, url } => write!(
                f,
                "revocation status of {} unknown (distribution point: {})",
                subject,
                url.as_deref().unwrap_or("none")
            ),
            Self::CertificateValidationFailed {
                subject,
                serial,
                reason,
            } => write!(f, "certificate {} (serial {}) rejected: {}", subject, serial, reason),
            Self::CrlDownloadFailed { url, reason } => {
                write!(f, "CRL download from {} failed: {}", url, reason)
            }
            Self::CrlExpired { url, next_update } => write!(
                f,
                "CRL from {} expired (nextUpdate {})",
                url,
                next_update.to_rfc3339()
            ),
        }
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    /// Record `event`. Must not block for long.
    fn record(&self, event: &AuditEvent);
}

/// An [`AuditSink`] that writes events to the `log` facade under the
/// `sosi_pki::audit` target, at a level matching their severity.
#[derive(Clone, Debug)]
pub struct LogAuditSink {
    ca_name: String,
}

impl LogAuditSink {
    /// Prefix each message with `ca_name`.
    pub fn new(ca_name: impl Into<String>) -> Self {
        Self {
            ca_name: ca_name.into(),
        }
    }
}

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        const TARGET: &str = "sosi_pki::audit";
        match event.severity() {
            Severity::Info => info!(target: TARGET, "[{}] {}: {}", self.ca_name, event.name(), event),
            Severity::Warning => warn!(target: TARGET, "[{}] {}: {}", self.ca_name, event.name(), event),
            Severity::Error => error!(target: TARGET, "[{}] {}: {}", self.ca_name, event.name(), event),
        }
    }
}
