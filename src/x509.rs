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

use crate::der::{self, Tag, CONSTRUCTED, CONTEXT_SPECIFIC};
use crate::Error;

pub(crate) struct Extension<'a> {
    pub(crate) critical: bool,
    pub(crate) id: untrusted::Input<'a>,
    pub(crate) value: untrusted::Input<'a>,
}

impl<'a> Extension<'a> {
    pub(crate) fn parse(der: &mut untrusted::Reader<'a>) -> Result<Extension<'a>, Error> {
        let id = der::expect_tag_and_get_value(der, Tag::OID)?;
        let critical = der::optional_boolean(der)?;
        let value = der::expect_tag_and_get_value(der, Tag::OctetString)?;
        Ok(Extension {
            id,
            critical,
            value,
        })
    }

    pub(crate) fn unsupported(&self) -> Result<(), Error> {
        match self.critical {
            true => Err(Error::UnsupportedCriticalExtension),
            false => Ok(()),
        }
    }
}

pub(crate) fn set_extension_once<T>(
    destination: &mut Option<T>,
    parser: impl Fn() -> Result<T, Error>,
) -> Result<(), Error> {
    match destination {
        // The extension value has already been set, indicating that we encountered it
        // more than once in our serialized data. That's invalid!
        Some(..) => Err(Error::ExtensionValueInvalid),
        None => {
            *destination = Some(parser()?);
            Ok(())
        }
    }
}

/// Dispatches a standard (id-ce) extension to `handler` by the last arc of
/// its OID. Extensions outside id-ce are ignored unless critical.
pub(crate) fn remember_extension(
    extension: &Extension,
    mut handler: impl FnMut(u8) -> Result<(), Error>,
) -> Result<(), Error> {
    // ISO arc for standard certificate and CRL extensions.
    // https://www.rfc-editor.org/rfc/rfc5280#appendix-A.2
    static ID_CE: [u8; 2] = oid![2, 5, 29];

    let id = extension.id.as_slice_less_safe();
    match id.split_last() {
        Some((last_octet, prefix)) if prefix == ID_CE => handler(*last_octet),
        _ => extension.unsupported(),
    }
}

// id-pe-authorityInfoAccess 1.3.6.1.5.5.7.1.1
pub(crate) static ID_PE_AUTHORITY_INFO_ACCESS: [u8; 8] = oid![1, 3, 6, 1, 5, 5, 7, 1, 1];

// id-ad-caIssuers 1.3.6.1.5.5.7.48.2
static ID_AD_CA_ISSUERS: [u8; 8] = oid![1, 3, 6, 1, 5, 5, 7, 48, 2];

/// A GeneralName as described in RFC 5280 section 4.2.1.6. Only the forms
/// this crate acts on are decoded.
pub(crate) enum GeneralName<'a> {
    UniformResourceIdentifier(untrusted::Input<'a>),
    DirectoryName,
    Other,
}

impl<'a> GeneralName<'a> {
    pub(crate) fn from_der(input: &mut untrusted::Reader<'a>) -> Result<Self, Error> {
        const URI_TAG: u8 = CONTEXT_SPECIFIC | 6;
        const DIRECTORY_NAME_TAG: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 4;

        let (tag, value) = der::read_tag_and_get_value(input)?;
        Ok(match tag {
            URI_TAG => GeneralName::UniformResourceIdentifier(value),
            DIRECTORY_NAME_TAG => GeneralName::DirectoryName,
            _ => GeneralName::Other,
        })
    }

    /// The name as a URI string, when it is one and is valid ASCII.
    pub(crate) fn uri(&self) -> Option<String> {
        match self {
            GeneralName::UniformResourceIdentifier(value) => {
                let bytes = value.as_slice_less_safe();
                bytes
                    .is_ascii()
                    .then(|| String::from_utf8_lossy(bytes).into_owned())
            }
            _ => None,
        }
    }
}

/// Collects the caIssuers URIs of an authorityInfoAccess extension value.
///
/// ```text
/// AuthorityInfoAccessSyntax ::= SEQUENCE SIZE (1..MAX) OF AccessDescription
/// AccessDescription ::= SEQUENCE {
///     accessMethod    OBJECT IDENTIFIER,
///     accessLocation  GeneralName }
/// ```
pub(crate) fn ca_issuers_uris(value: untrusted::Input) -> Result<Vec<String>, Error> {
    let mut uris = Vec::new();
    value.read_all(Error::BadDer, |value| {
        der::nested_of_mut(
            value,
            Tag::Sequence,
            Tag::Sequence,
            Error::BadDer,
            |description| {
                let method = der::expect_tag_and_get_value(description, Tag::OID)?;
                let location = GeneralName::from_der(description)?;
                if method.as_slice_less_safe() == ID_AD_CA_ISSUERS {
                    if let Some(uri) = location.uri() {
                        uris.push(uri);
                    }
                }
                Ok(())
            },
        )
    })?;
    Ok(uris)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ca_issuers_are_extracted() {
        let uri = b"http://aia.example.dk/ca.cer";
        let mut der = vec![0x30, 0x00, 0x30, 0x00, 0x06, 0x08];
        der.extend_from_slice(&ID_AD_CA_ISSUERS);
        der.push(0x86);
        der.push(u8::try_from(uri.len()).unwrap());
        der.extend_from_slice(uri);
        der[3] = u8::try_from(der.len() - 4).unwrap();
        der[1] = u8::try_from(der.len() - 2).unwrap();

        let uris = ca_issuers_uris(untrusted::Input::from(&der[..])).unwrap();
        assert_eq!(uris, vec!["http://aia.example.dk/ca.cer".to_string()]);
    }

    #[test]
    fn ocsp_access_descriptions_are_skipped() {
        // id-ad-ocsp 1.3.6.1.5.5.7.48.1
        let ocsp: [u8; 8] = oid![1, 3, 6, 1, 5, 5, 7, 48, 1];
        let uri = b"http://ocsp.example.dk";
        let mut der = vec![0x30, 0x00, 0x30, 0x00, 0x06, 0x08];
        der.extend_from_slice(&ocsp);
        der.push(0x86);
        der.push(u8::try_from(uri.len()).unwrap());
        der.extend_from_slice(uri);
        der[3] = u8::try_from(der.len() - 4).unwrap();
        der[1] = u8::try_from(der.len() - 2).unwrap();

        let uris = ca_issuers_uris(untrusted::Input::from(&der[..])).unwrap();
        assert!(uris.is_empty());
    }

    #[test]
    fn non_standard_critical_extension_is_rejected() {
        let id = [0x2a, 0x03];
        let extension = Extension {
            critical: true,
            id: untrusted::Input::from(&id[..]),
            value: untrusted::Input::from(&[][..]),
        };
        assert_eq!(
            remember_extension(&extension, |_| Ok(())),
            Err(Error::UnsupportedCriticalExtension)
        );
    }
}
