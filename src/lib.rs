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

//! sosi-pki: certificate trust and CRL revocation checking for DGWS/SOSI
//! federations.
//!
//! A [`CertificationAuthority`] decides whether an X.509 certificate is
//! trusted by a federation. It checks the validity window, rejects the
//! legacy OCES1 hierarchy, resolves the issuing intermediate through its
//! authorityInfoAccess caIssuers URL, checks that intermediate against the
//! federation root, and finally consults the issuer's CRL.
//!
//! CRLs are downloaded with conditional GETs and kept in a [`CrlCache`]. A
//! CRL is only used once its signature has been verified against the issuer
//! of the certificate that referenced it.
//!
//! # Revocation checking is not strict by default
//!
//! When no usable CRL can be obtained, the default [`RevocationPolicy`]
//! reports the certificate as valid with [`StatusTimestamp::Unknown`] and
//! records an [`AuditEvent::RevocationCheckSkipped`] warning. Callers that
//! need a revocation guarantee must either enable strict checking with
//! [`RevocationPolicyBuilder::with_strict`] or inspect
//! [`CertificateStatus::has_revocation_evidence`].
//!
//! ```no_run
//! use sosi_pki::{Certificate, CertificationAuthority, Federation, RevocationPolicyBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Certificate::from_base64(&std::fs::read_to_string("oces2-root.pem")?)?;
//! let ca = CertificationAuthority::builder(Federation::production(root))
//!     .with_revocation_policy(RevocationPolicyBuilder::new().with_strict(true).build()?)
//!     .build()?;
//!
//! let leaf = Certificate::from_der(&std::fs::read("employee.cer")?)?;
//! let status = ca.certificate_status(&leaf)?;
//! assert!(status.has_revocation_evidence() || !status.is_valid());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, clippy::as_conversions)]
#![warn(clippy::use_self)]

#[macro_use]
mod der;

mod audit;
mod authority;
mod cert;
mod chain;
pub mod config;
mod crl;
mod error;
mod federation;
pub mod fetch;
mod intermediate;
mod name;
mod retry;
mod revocation;
mod ring_algs;
mod signed_data;
mod time;
mod x509;

#[cfg(test)]
pub(crate) mod test_utils;

pub use {
    audit::{AuditEvent, AuditSink, LogAuditSink, Severity},
    authority::{CertificationAuthority, CertificationAuthorityBuilder},
    cert::Certificate,
    chain::ChainValidator,
    crl::{CertRevocationList, RevocationReason, RevokedCert},
    error::{Error, PkiError},
    federation::{
        Environment, Federation, Generation, GenerationMarkers, PRODUCTION_AIA_PREFIX,
        TEST_AIA_PREFIX,
    },
    fetch::{FetchError, FetchResponse, FetchTimeouts, HttpFetch, ReqwestFetcher},
    intermediate::{
        InMemoryIntermediateCache, IntermediateCertificateCache, IntermediateResolver,
        ResolvedIntermediate,
    },
    name::DistinguishedName,
    retry::RetryPolicy,
    revocation::{
        CertificateStatus, CrlCache, CrlInfo, InMemoryCrlCache, RefreshInterval,
        RevocationChecker, RevocationPolicy, RevocationPolicyBuilder, StatusTimestamp,
        VerificationState,
    },
    time::{Clock, SystemClock},
};
