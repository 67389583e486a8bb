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

use log::debug;

use crate::cert::Certificate;
use crate::error::PkiError;
use crate::federation::{Federation, Generation};
use crate::intermediate::IntermediateResolver;
use crate::revocation::{CertificateStatus, RevocationChecker};
use crate::time::Clock;

/// Validates certificates against a federation's root, through at most one
/// intermediate.
pub struct ChainValidator {
    federation: Federation,
    resolver: IntermediateResolver,
    revocation: RevocationChecker,
    clock: Arc<dyn Clock>,
}

impl ChainValidator {
    pub(crate) fn new(
        federation: Federation,
        resolver: IntermediateResolver,
        revocation: RevocationChecker,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            federation,
            resolver,
            revocation,
            clock,
        }
    }

    /// The federation certificates are validated against.
    pub fn federation(&self) -> &Federation {
        &self.federation
    }

    /// The revocation checker used for leaves and intermediates.
    pub fn revocation_checker(&self) -> &RevocationChecker {
        &self.revocation
    }

    /// Determine the OCES generation of `cert` from its issuer. OCES1 and
    /// unrecognized issuers are errors.
    pub fn generation(&self, cert: &Certificate) -> Result<Generation, PkiError> {
        match self.federation.markers().classify(cert.issuer()) {
            Some(Generation::Oces2) => Ok(Generation::Oces2),
            Some(Generation::Oces1) => Err(PkiError::UnsupportedGeneration {
                issuer: cert.issuer().to_string(),
            }),
            None => Err(PkiError::UnknownGeneration {
                issuer: cert.issuer().to_string(),
            }),
        }
    }

    /// Fetch the intermediate that issued `cert` and check that it is
    /// current, signed by the root and not revoked. Only an intermediate
    /// that passes these checks is cached.
    pub fn resolve_and_validate_intermediate(
        &self,
        cert: &Certificate,
    ) -> Result<Arc<Certificate>, PkiError> {
        self.generation(cert)?;

        let root = self.federation.root();
        let resolved = self.resolver.resolve(cert)?;
        let intermediate = &resolved.cert;
        if intermediate.subject() != cert.issuer() {
            return Err(self.untrusted(cert));
        }

        if !intermediate.is_valid_at(self.clock.now()) {
            return Err(PkiError::IntermediateExpired {
                subject: intermediate.subject().to_string(),
            });
        }

        if intermediate.verify_issued_by(root).is_err() {
            return Err(PkiError::IntermediateNotSignedByRoot {
                subject: intermediate.subject().to_string(),
                ca: self.federation.ca_name().to_owned(),
            });
        }

        if !self
            .revocation
            .revocation_status(intermediate, root)?
            .is_valid()
        {
            return Err(PkiError::IntermediateRevoked {
                subject: intermediate.subject().to_string(),
            });
        }

        self.resolver.accept(&resolved);
        Ok(Arc::clone(&resolved.cert))
    }

    /// Evaluate `cert`: validity dates, generation, issuer chain, then
    /// revocation.
    ///
    /// The configured root is the one certificate accepted without a
    /// revocation check, under strict policies too. Its status is `valid`
    /// with no timestamp.
    pub fn certificate_status(&self, cert: &Certificate) -> Result<CertificateStatus, PkiError> {
        let now = self.clock.now();
        if !cert.is_valid_at(now) {
            debug!(
                "{} is outside its validity period {} to {}",
                cert.subject(),
                cert.not_before().to_rfc3339(),
                cert.not_after().to_rfc3339()
            );
            return Ok(CertificateStatus::new(false, None));
        }

        self.generation(cert)?;

        let root = self.federation.root();
        if cert == root.as_ref() {
            return Ok(CertificateStatus::new(true, None));
        }

        if cert.issuer() == root.subject() {
            cert.verify_issued_by(root)
                .map_err(|_| self.untrusted(cert))?;
            return self.revocation.revocation_status(cert, root);
        }

        let intermediate = self.resolve_and_validate_intermediate(cert)?;
        cert.verify_issued_by(&intermediate)
            .map_err(|_| self.untrusted(cert))?;
        self.revocation.revocation_status(cert, &intermediate)
    }

    fn untrusted(&self, cert: &Certificate) -> PkiError {
        PkiError::UntrustedIssuer {
            issuer: cert.issuer().to_string(),
            ca: self.federation.ca_name().to_owned(),
        }
    }
}

impl fmt::Debug for ChainValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainValidator")
            .field("federation", &self.federation)
            .field("resolver", &self.resolver)
            .field("revocation", &self.revocation)
            .finish_non_exhaustive()
    }
}
