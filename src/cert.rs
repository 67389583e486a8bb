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

use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::der::{self, Tag, CONSTRUCTED, CONTEXT_SPECIFIC};
use crate::name::DistinguishedName;
use crate::ring_algs::SUPPORTED_SIG_ALGS;
use crate::signed_data::{self, OwnedSignedData, SignedData};
use crate::x509::{
    self, remember_extension, set_extension_once, Extension, GeneralName,
    ID_PE_AUTHORITY_INFO_ACCESS,
};
use crate::Error;

/// A parsed X.509 v3 certificate.
///
/// Only the fields needed to evaluate trust in a DGWS/SOSI federation are
/// decoded: names, validity, the public key, basicConstraints, keyUsage, the
/// CRL distribution points and the caIssuers locations. The value is
/// immutable once parsed and owns its encoding.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    serial: Vec<u8>,
    signed_data: OwnedSignedData,
    issuer: DistinguishedName,
    subject: DistinguishedName,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    spki: Vec<u8>,
    is_ca: bool,
    key_usage: Option<KeyUsage>,
    crl_distribution_points: Vec<String>,
    ca_issuers: Vec<String>,
}

impl Certificate {
    /// Parse the ASN.1 DER-encoded X.509 encoding of the certificate
    /// `cert_der`.
    pub fn from_der(cert_der: &[u8]) -> Result<Self, Error> {
        let (tbs, signed_data) =
            untrusted::Input::from(cert_der).read_all(Error::BadDer, |cert_der| {
                der::nested(cert_der, Tag::Sequence, Error::BadDer, SignedData::from_der)
            })?;

        tbs.read_all(Error::BadDer, |tbs| {
            version3(tbs)?;

            let serial = lenient_certificate_serial_number(tbs)?;

            let signature = der::expect_tag_and_get_value(tbs, Tag::Sequence)?;
            // TODO: In mozilla::pkix, the comparison is done based on the
            // normalized value (ignoring whether or not there is an optional NULL
            // parameter for RSA-based algorithms), so this may be too strict.
            if signature.as_slice_less_safe() != signed_data.algorithm.as_slice_less_safe() {
                return Err(Error::SignatureAlgorithmMismatch);
            }

            let issuer = der::expect_tag_and_get_value(tbs, Tag::Sequence)?;
            let (not_before, not_after) = der::nested(tbs, Tag::Sequence, Error::BadDer, |v| {
                Ok((der::time_choice(v)?, der::time_choice(v)?))
            })?;
            let subject = der::expect_tag_and_get_value(tbs, Tag::Sequence)?;
            let spki = der::expect_tag_and_get_value(tbs, Tag::Sequence)?;

            // In theory there could be fields [1] issuerUniqueID and [2]
            // subjectUniqueID, but in practice there never are, and to keep the
            // code small and simple we don't accept any certificates that do
            // contain them.

            let mut extensions = Extensions::default();
            if !tbs.at_end() {
                der::nested(
                    tbs,
                    Tag::ContextSpecificConstructed3,
                    Error::MalformedExtensions,
                    |tagged| {
                        der::nested_of_mut(
                            tagged,
                            Tag::Sequence,
                            Tag::Sequence,
                            Error::BadDer,
                            |extension| {
                                remember_cert_extension(
                                    &mut extensions,
                                    &Extension::parse(extension)?,
                                )
                            },
                        )
                    },
                )?;
            }

            Ok(Self {
                der: cert_der.to_vec(),
                serial: serial.as_slice_less_safe().to_vec(),
                signed_data: signed_data.owned(),
                issuer: DistinguishedName::from_der(issuer)?,
                subject: DistinguishedName::from_der(subject)?,
                not_before,
                not_after,
                spki: spki.as_slice_less_safe().to_vec(),
                is_ca: extensions.basic_constraints.unwrap_or(false),
                key_usage: extensions.key_usage,
                crl_distribution_points: extensions.crl_distribution_points.unwrap_or_default(),
                ca_issuers: extensions.ca_issuers.unwrap_or_default(),
            })
        })
    }

    /// Parse a Base64 encoded certificate, as carried in SOAP security
    /// headers. PEM armour and embedded whitespace are tolerated.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let body: String = encoded
            .lines()
            .filter(|line| !line.trim_start().starts_with("-----"))
            .flat_map(|line| line.chars())
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|_| Error::BadBase64)?;
        Self::from_der(&der)
    }

    /// The DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Raw DER encoded certificate serial number.
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// The serial number as lower-case hex, for logs and audit records.
    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// The certificate issuer.
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// The certificate subject.
    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    /// Start of the validity period.
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity period.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Whether `time` falls inside the validity period, bounds included.
    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.not_before <= time && time <= self.not_after
    }

    /// Whether basicConstraints marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Whether issuer and subject are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }

    /// All URIs named in the cRLDistributionPoints extension, in order.
    pub fn crl_distribution_points(&self) -> &[String] {
        &self.crl_distribution_points
    }

    /// The first HTTP(S) CRL distribution point. This is the one revocation
    /// checking downloads from.
    pub fn crl_distribution_point(&self) -> Option<&str> {
        first_http_uri(&self.crl_distribution_points)
    }

    /// All caIssuers URIs named in the authorityInfoAccess extension.
    pub fn ca_issuers(&self) -> &[String] {
        &self.ca_issuers
    }

    /// The first HTTP(S) caIssuers URI, used to fetch the issuing
    /// intermediate.
    pub fn ca_issuer(&self) -> Option<&str> {
        first_http_uri(&self.ca_issuers)
    }

    /// Checks that `issuer` names this certificate's issuer and that its key
    /// produced this certificate's signature.
    pub fn verify_issued_by(&self, issuer: &Self) -> Result<(), Error> {
        if self.issuer != issuer.subject {
            return Err(Error::UnknownIssuer);
        }
        issuer.verify_signature(&self.signed_data)
    }

    pub(crate) fn verify_signature(&self, signed_data: &OwnedSignedData) -> Result<(), Error> {
        signed_data::verify_signed_data(
            SUPPORTED_SIG_ALGS,
            untrusted::Input::from(&self.spki[..]),
            &signed_data.borrow(),
        )
    }

    // When validating certificate revocation lists (CRLs) the key usage is
    // consulted to determine if the cert is allowed to sign CRLs. A certificate
    // without the extension may sign anything.
    pub(crate) fn can_sign_crls(&self) -> bool {
        self.key_usage.map_or(true, |ku| ku.crl_sign())
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("serial", &self.serial_hex())
            .field("subject", &self.subject.to_string())
            .field("issuer", &self.issuer.to_string())
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn first_http_uri(uris: &[String]) -> Option<&str> {
    uris.iter()
        .map(String::as_str)
        .find(|uri| uri.starts_with("http://") || uri.starts_with("https://"))
}

// mozilla::pkix supports v1, v2, v3, and v4, including both the implicit
// (correct) and explicit (incorrect) encoding of v1. We allow only v3.
fn version3(input: &mut untrusted::Reader) -> Result<(), Error> {
    der::nested(
        input,
        Tag::ContextSpecificConstructed0,
        Error::UnsupportedCertVersion,
        |input| {
            let version = der::small_nonnegative_integer(input)?;
            if version != 2 {
                // v3
                return Err(Error::UnsupportedCertVersion);
            }
            Ok(())
        },
    )
}

pub(crate) fn lenient_certificate_serial_number<'a>(
    input: &mut untrusted::Reader<'a>,
) -> Result<untrusted::Input<'a>, Error> {
    // https://tools.ietf.org/html/rfc5280#section-4.1.2.2:
    // * Conforming CAs MUST NOT use serialNumber values longer than 20 octets."
    // * "The serial number MUST be a positive integer [...]"
    //
    // However, we don't enforce these constraints, as there are widely-deployed trust anchors
    // and many X.509 implementations in common use that violate these constraints. This is called
    // out by the same section of RFC 5280 as cited above:
    //   Note: Non-conforming CAs may issue certificates with serial numbers
    //   that are negative or zero.  Certificate users SHOULD be prepared to
    //   gracefully handle such certificates.
    der::integer_content(input)
}

#[derive(Default)]
struct Extensions {
    basic_constraints: Option<bool>,
    key_usage: Option<KeyUsage>,
    crl_distribution_points: Option<Vec<String>>,
    ca_issuers: Option<Vec<String>>,
}

fn remember_cert_extension(
    extensions: &mut Extensions,
    extension: &Extension,
) -> Result<(), Error> {
    if extension.id.as_slice_less_safe() == ID_PE_AUTHORITY_INFO_ACCESS {
        return set_extension_once(&mut extensions.ca_issuers, || {
            x509::ca_issuers_uris(extension.value)
        });
    }

    remember_extension(extension, |id| match id {
        // id-ce-keyUsage 2.5.29.15.
        15 => set_extension_once(&mut extensions.key_usage, || {
            extension.value.read_all(Error::BadDer, KeyUsage::from_der)
        }),

        // id-ce-basicConstraints 2.5.29.19
        19 => set_extension_once(&mut extensions.basic_constraints, || {
            extension.value.read_all(Error::BadDer, |value| {
                der::nested(value, Tag::Sequence, Error::BadDer, |seq| {
                    let is_ca = der::optional_boolean(seq)?;
                    // pathLenConstraint is not enforced; the chain is fixed at
                    // root, intermediate, leaf.
                    let _ = seq.read_bytes_to_end();
                    Ok(is_ca)
                })
            })
        }),

        // id-ce-cRLDistributionPoints 2.5.29.31
        31 => set_extension_once(&mut extensions.crl_distribution_points, || {
            crl_distribution_point_uris(extension.value)
        }),

        // subjectKeyIdentifier, subjectAltName, certificatePolicies,
        // authorityKeyIdentifier and extKeyUsage carry nothing trust
        // evaluation here depends on.
        14 | 17 | 32 | 35 | 37 => Ok(()),

        // Unsupported extension
        _ => extension.unsupported(),
    })
}

/// The keyUsage bits of a certificate, bit 0 (digitalSignature) lowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KeyUsage(u16);

impl KeyUsage {
    const CRL_SIGN: u16 = 1 << 6;

    fn from_der(input: &mut untrusted::Reader) -> Result<Self, Error> {
        der::nested(input, Tag::BitString, Error::BadDer, |value| {
            let unused_bits = value.read_byte().map_err(|_| Error::BadDer)?;
            if unused_bits > 7 {
                return Err(Error::BadDer);
            }
            let raw = value.read_bytes_to_end().as_slice_less_safe();
            // Bit 0 is the most significant bit of the first octet.
            let mut bits = 0u16;
            for (i, byte) in raw.iter().take(2).enumerate() {
                for bit in 0..8usize {
                    if byte & (0x80u8 >> bit) != 0 {
                        bits |= 1 << (i * 8 + bit);
                    }
                }
            }
            Ok(Self(bits))
        })
    }

    pub(crate) fn crl_sign(self) -> bool {
        self.0 & Self::CRL_SIGN != 0
    }
}

/// Collects the fullName URIs of a cRLDistributionPoints extension value as
/// described in RFC 5280 section 4.2.1.13.
fn crl_distribution_point_uris(value: untrusted::Input) -> Result<Vec<String>, Error> {
    const DISTRIBUTION_POINT_TAG: u8 = CONTEXT_SPECIFIC | CONSTRUCTED;
    const REASONS_TAG: u8 = CONTEXT_SPECIFIC | 1;
    const CRL_ISSUER_TAG: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 2;
    const FULL_NAME_TAG: u8 = CONTEXT_SPECIFIC | CONSTRUCTED;
    const NAME_RELATIVE_TO_CRL_ISSUER_TAG: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 1;

    let mut uris = Vec::new();
    value.read_all(Error::BadDer, |value| {
        der::nested_of_mut(value, Tag::Sequence, Tag::Sequence, Error::BadDer, |dp| {
            let mut distribution_point = None;
            let mut crl_issuer = None;
            while !dp.at_end() {
                let (tag, value) = der::read_tag_and_get_value(dp)?;
                match tag {
                    DISTRIBUTION_POINT_TAG => {
                        set_extension_once(&mut distribution_point, || Ok(value))?
                    }
                    REASONS_TAG => {}
                    CRL_ISSUER_TAG => set_extension_once(&mut crl_issuer, || Ok(value))?,
                    _ => return Err(Error::BadDer),
                }
            }

            // RFC 5280 section 4.2.1.13:
            //   a DistributionPoint MUST NOT consist of only the reasons field; either distributionPoint or
            //   cRLIssuer MUST be present.
            let Some(name) = distribution_point else {
                return match crl_issuer {
                    Some(_) => Ok(()),
                    None => Err(Error::MalformedExtensions),
                };
            };

            name.read_all(Error::BadDer, |name| {
                let (tag, general_names) = der::read_tag_and_get_value(name)?;
                match tag {
                    FULL_NAME_TAG => general_names.read_all(Error::BadDer, |names| {
                        while !names.at_end() {
                            if let Some(uri) = GeneralName::from_der(names)?.uri() {
                                uris.push(uri);
                            }
                        }
                        Ok(())
                    }),
                    NAME_RELATIVE_TO_CRL_ISSUER_TAG => Ok(()),
                    _ => Err(Error::BadDer),
                }
            })
        })
    })?;
    Ok(uris)
}
