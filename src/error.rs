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

/// An error that occurs while decoding a certificate or CRL, or while
/// verifying a signature over one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The Base64 (or PEM) armour around a certificate could not be decoded.
    BadBase64,

    /// The encoding of some ASN.1 DER-encoded item is invalid.
    BadDer,

    /// The encoding of an ASN.1 DER-encoded time is invalid.
    BadDerTime,

    /// An X.509 extension is invalid.
    ExtensionValueInvalid,

    /// The CRL number extension was invalid.
    InvalidCrlNumber,

    /// The signature is invalid for the given public key.
    InvalidSignatureForPublicKey,

    /// The certificate that issued a CRL carries a key usage extension without
    /// the cRLSign bit.
    IssuerNotCrlSigner,

    /// The certificate extensions are malformed.
    MalformedExtensions,

    /// The algorithm in the TBSCertificate "signature" field of a certificate
    /// does not match the algorithm in the signature of the certificate.
    SignatureAlgorithmMismatch,

    /// The certificate is not a v3 X.509 certificate.
    ///
    /// This error may be also reported if the certificate version field
    /// is malformed.
    UnsupportedCertVersion,

    /// The certificate or CRL contains an unsupported critical extension.
    UnsupportedCriticalExtension,

    /// The CRL is not a v2 X.509 CRL.
    ///
    /// This error may also be reported if the CRL version field is malformed.
    UnsupportedCrlVersion,

    /// The CRL is a delta CRL. Only complete CRLs are supported.
    UnsupportedDeltaCrl,

    /// The CRL contains entries for certificates issued by another CA.
    UnsupportedIndirectCrl,

    /// The revocation reason in a CRL entry is not one defined by RFC 5280.
    UnsupportedRevocationReason,

    /// The certificate or CRL names an issuer other than the certificate it is
    /// being verified against.
    UnknownIssuer,

    /// The signature algorithm for a signature is not in the set of supported
    /// signature algorithms given.
    UnsupportedSignatureAlgorithm,

    /// The signature's algorithm does not match the algorithm of the public
    /// key it is being validated for. This may be because the public key
    /// algorithm's OID isn't recognized (e.g. DSA), or the public key
    /// algorithm's parameters don't match the supported parameters for that
    /// algorithm (e.g. ECC keys for unsupported curves), or the public key
    /// algorithm and the signature algorithm simply don't match (e.g.
    /// verifying an RSA signature with an ECC public key).
    UnsupportedSignatureAlgorithmForPublicKey,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

/// An error that ends a trust decision.
///
/// Each variant names one failure so operators can tell policy violations
/// (an unsupported generation, an untrusted issuer, a revoked intermediate)
/// apart from infrastructure problems (missing revocation evidence under
/// strict policy, an unreachable intermediate).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PkiError {
    /// The authority was configured with missing or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A certificate could not be decoded.
    #[error("malformed certificate: {0}")]
    Malformed(#[from] Error),

    /// The certificate belongs to the legacy OCES1 hierarchy, which is never
    /// accepted.
    #[error("OCES1 certificates are not supported (issuer: {issuer})")]
    UnsupportedGeneration {
        /// Rendered issuer DN.
        issuer: String,
    },

    /// The issuer matches neither the OCES1 nor the OCES2 naming pattern.
    #[error("unable to determine the OCES generation of a certificate issued by {issuer}")]
    UnknownGeneration {
        /// Rendered issuer DN.
        issuer: String,
    },

    /// The certificate was not issued by the root or by the resolved
    /// intermediate.
    #[error("certificate issued by {issuer} is not trusted by {ca}")]
    UntrustedIssuer {
        /// Rendered issuer DN of the rejected certificate.
        issuer: String,
        /// Display name of the certification authority.
        ca: String,
    },

    /// The certificate carries no caIssuers location for its issuer.
    #[error("certificate {subject} has no caIssuers authority information access URL")]
    MissingIssuerLocation {
        /// Rendered subject DN.
        subject: String,
    },

    /// The intermediate certificate could not be downloaded or decoded.
    #[error("intermediate certificate could not be retrieved from {url}: {reason}")]
    IntermediateUnavailable {
        /// The caIssuers URL.
        url: String,
        /// Why retrieval failed.
        reason: String,
    },

    /// The intermediate is outside its validity period.
    #[error("intermediate certificate {subject} is outside its validity period")]
    IntermediateExpired {
        /// Rendered subject DN of the intermediate.
        subject: String,
    },

    /// The intermediate is not signed by the configured root.
    #[error("intermediate certificate {subject} is not signed by {ca}")]
    IntermediateNotSignedByRoot {
        /// Rendered subject DN of the intermediate.
        subject: String,
        /// Display name of the certification authority.
        ca: String,
    },

    /// The intermediate is listed on its issuer's CRL.
    #[error("intermediate certificate {subject} is revoked")]
    IntermediateRevoked {
        /// Rendered subject DN of the intermediate.
        subject: String,
    },

    /// Strict revocation checking is enabled and no usable CRL exists.
    #[error(
        "no usable CRL for {subject} (distribution point: {})",
        .url.as_deref().unwrap_or("none")
    )]
    MissingRevocationEvidence {
        /// Rendered subject DN of the certificate being checked.
        subject: String,
        /// The CRL distribution point, if the certificate names one.
        url: Option<String>,
    },
}
