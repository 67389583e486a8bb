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

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::cert::Certificate;
use crate::der::{self, Tag};
use crate::name::DistinguishedName;
use crate::signed_data::{OwnedSignedData, SignedData};
use crate::x509::{remember_extension, set_extension_once, Extension};
use crate::Error;

mod revoked_cert;

pub use revoked_cert::{RevocationReason, RevokedCert};

/// An owned RFC 5280[^1] profile Certificate Revocation List (CRL).
///
/// Not supported:
///   * CRL versions other than version 2.
///   * CRLs missing the next update field.
///   * Delta CRLs.
///   * Indirect CRLs.
///
/// An issuingDistributionPoint extension is accepted at parse time and
/// reported by [`CertRevocationList::is_partitioned`]; revocation checking
/// refuses to use such a CRL.
///
/// [^1]: <https://www.rfc-editor.org/rfc/rfc5280#section-5>
#[derive(Clone, Debug)]
pub struct CertRevocationList {
    der: Vec<u8>,
    signed_data: OwnedSignedData,
    issuer: DistinguishedName,
    this_update: DateTime<Utc>,
    next_update: DateTime<Utc>,
    crl_number: Option<Vec<u8>>,
    issuing_distribution_point: bool,
    /// A map of the revoked certificates contained in then CRL, keyed by the DER encoding
    /// of the revoked cert's serial number.
    revoked_certs: BTreeMap<Vec<u8>, RevokedCert>,
}

impl CertRevocationList {
    /// Try to parse the given bytes as a DER encoded CRL.
    pub fn from_der(crl_der: &[u8]) -> Result<Self, Error> {
        let (tbs_cert_list, signed_data) =
            untrusted::Input::from(crl_der).read_all(Error::BadDer, |reader| {
                der::nested(reader, Tag::Sequence, Error::BadDer, SignedData::from_der)
            })?;

        tbs_cert_list.read_all(Error::BadDer, |tbs_cert_list| {
            // RFC 5280 §5.1.2.1:
            //   This optional field describes the version of the encoded CRL.  When
            //   extensions are used, as required by this profile, this field MUST be
            //   present and MUST specify version 2 (the integer value is 1).
            // NOTE: Encoded value of version 2 is 1.
            if !tbs_cert_list.peek(Tag::Integer.into())
                || der::small_nonnegative_integer(tbs_cert_list)? != 1
            {
                return Err(Error::UnsupportedCrlVersion);
            }

            // RFC 5280 §5.1.2.2:
            //   This field MUST contain the same algorithm identifier as the
            //   signatureAlgorithm field in the sequence CertificateList
            let signature = der::expect_tag_and_get_value(tbs_cert_list, Tag::Sequence)?;
            if signature.as_slice_less_safe() != signed_data.algorithm.as_slice_less_safe() {
                return Err(Error::SignatureAlgorithmMismatch);
            }

            // RFC 5280 §5.1.2.3:
            //   The issuer field MUST contain a non-empty X.500 distinguished name (DN).
            let issuer = der::expect_tag_and_get_value(tbs_cert_list, Tag::Sequence)?;

            // RFC 5280 §5.1.2.4:
            //    This field indicates the issue date of this CRL.  thisUpdate may be
            //    encoded as UTCTime or GeneralizedTime.
            let this_update = der::time_choice(tbs_cert_list)?;

            // While OPTIONAL in the ASN.1 module, RFC 5280 §5.1.2.5 says:
            //   Conforming CRL issuers MUST include the nextUpdate field in all CRLs.
            let next_update = der::time_choice(tbs_cert_list)?;

            // RFC 5280 §5.1.2.6:
            //   When there are no revoked certificates, the revoked certificates list
            //   MUST be absent
            let mut revoked_certs = BTreeMap::new();
            if tbs_cert_list.peek(Tag::Sequence.into()) {
                let list = der::expect_tag_and_get_value(tbs_cert_list, Tag::Sequence)?;
                list.read_all(Error::BadDer, |list| {
                    while !list.at_end() {
                        let revoked_cert = RevokedCert::from_der(list)?;
                        revoked_certs.insert(revoked_cert.serial_number.clone(), revoked_cert);
                    }
                    Ok(())
                })?;
            }

            let mut crl = Self {
                der: crl_der.to_vec(),
                signed_data: signed_data.owned(),
                issuer: DistinguishedName::from_der(issuer)?,
                this_update,
                next_update,
                crl_number: None,
                issuing_distribution_point: false,
                revoked_certs,
            };

            // RFC 5280 §5.1.2.7:
            //   This field may only appear if the version is 2 (Section 5.1.2.1).  If
            //   present, this field is a sequence of one or more CRL extensions.
            if !tbs_cert_list.at_end() {
                der::nested(
                    tbs_cert_list,
                    Tag::ContextSpecificConstructed0,
                    Error::MalformedExtensions,
                    |tagged| {
                        der::nested_of_mut(
                            tagged,
                            Tag::Sequence,
                            Tag::Sequence,
                            Error::BadDer,
                            |extension| {
                                // RFC 5280 §5.2:
                                //   If a CRL contains a critical extension
                                //   that the application cannot process, then the application MUST NOT
                                //   use that CRL to determine the status of certificates.  However,
                                //   applications may ignore unrecognized non-critical extensions.
                                crl.remember_extension(&Extension::parse(extension)?)
                            },
                        )
                    },
                )?;
            }

            Ok(crl)
        })
    }

    fn remember_extension(&mut self, extension: &Extension) -> Result<(), Error> {
        remember_extension(extension, |id| {
            match id {
                // id-ce-cRLNumber 2.5.29.20 - RFC 5280 §5.2.3
                20 => set_extension_once(&mut self.crl_number, || {
                    // RFC 5280 §5.2.3:
                    //   CRL verifiers MUST be able to handle CRLNumber values
                    //   up to 20 octets.  Conforming CRL issuers MUST NOT use CRLNumber
                    //   values longer than 20 octets.
                    extension.value.read_all(Error::InvalidCrlNumber, |der| {
                        let crl_number = der::integer_content(der)
                            .map_err(|_| Error::InvalidCrlNumber)?
                            .as_slice_less_safe();
                        if crl_number.len() <= 20 && crl_number[0] & 0x80 == 0 {
                            Ok(crl_number.to_vec())
                        } else {
                            Err(Error::InvalidCrlNumber)
                        }
                    })
                }),

                // id-ce-deltaCRLIndicator 2.5.29.27 - RFC 5280 §5.2.4
                // We explicitly do not support delta CRLs.
                27 => Err(Error::UnsupportedDeltaCrl),

                // id-ce-issuingDistributionPoint 2.5.29.28 - RFC 5280 §5.2.5
                // A CRL scoped by a distribution point is a partition of the
                // issuer's revocation data. We record its presence only.
                28 => {
                    if self.issuing_distribution_point {
                        return Err(Error::ExtensionValueInvalid);
                    }
                    self.issuing_distribution_point = true;
                    Ok(())
                }

                // id-ce-authorityKeyIdentifier 2.5.29.35 - RFC 5280 §5.2.1, §4.2.1.1
                // We recognize the extension but don't retain its value for use.
                35 => Ok(()),

                // Unsupported extension
                _ => extension.unsupported(),
            }
        })
    }

    /// The DER encoding the list was parsed from.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The CRL issuer.
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// When this CRL was issued.
    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    /// When the issuer promises the next CRL.
    pub fn next_update(&self) -> DateTime<Utc> {
        self.next_update
    }

    /// The cRLNumber extension value, big-endian, if present.
    pub fn crl_number(&self) -> Option<&[u8]> {
        self.crl_number.as_deref()
    }

    /// Whether the CRL carries an issuingDistributionPoint extension, making
    /// it a partition of its issuer's revocation data rather than a complete
    /// list. RFC 5280 requires the extension to be critical.
    pub fn is_partitioned(&self) -> bool {
        self.issuing_distribution_point
    }

    /// Whether `now` is past `nextUpdate` plus the `grace` period.
    pub fn is_expired(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self.next_update.checked_add_signed(grace) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Look up a serial number, in the DER integer encoding used by
    /// [`Certificate::serial`].
    pub fn find_serial(&self, serial: &[u8]) -> Option<&RevokedCert> {
        self.revoked_certs.get(serial)
    }

    /// Iterate over the revoked certificates, ordered by serial encoding.
    pub fn revoked_certs(&self) -> impl Iterator<Item = &RevokedCert> {
        self.revoked_certs.values()
    }

    /// Number of revoked certificates listed.
    pub fn len(&self) -> usize {
        self.revoked_certs.len()
    }

    /// Whether the list names no revoked certificates.
    pub fn is_empty(&self) -> bool {
        self.revoked_certs.is_empty()
    }

    /// Verify that `issuer` issued this CRL: the names must match, the issuer
    /// must be allowed to sign CRLs, and its key must verify the signature.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<(), Error> {
        if &self.issuer != issuer.subject() {
            return Err(Error::UnknownIssuer);
        }
        if !issuer.can_sign_crls() {
            return Err(Error::IssuerNotCrlSigner);
        }
        issuer.verify_signature(&self.signed_data)
    }
}

impl PartialEq for CertRevocationList {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for CertRevocationList {}
