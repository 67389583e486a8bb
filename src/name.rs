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

use core::fmt::{self, Write};

use crate::der::{self, Tag};
use crate::Error;

/// An X.501 Name, as found in the issuer and subject fields of certificates
/// and CRLs.
///
/// Names compare by their DER encoding. The decoded attributes are kept for
/// rendering and for the issuer-name sniffing used to tell OCES generations
/// apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DistinguishedName {
    der: Vec<u8>,
    attributes: Vec<Attribute>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Attribute {
    oid: Vec<u8>,
    value: String,
}

// id-at arc 2.5.4
const ID_AT: [u8; 2] = oid![2, 5, 4];
const COMMON_NAME: u8 = 3;
const SERIAL_NUMBER: u8 = 5;
const COUNTRY: u8 = 6;
const LOCALITY: u8 = 7;
const STATE: u8 = 8;
const ORGANIZATION: u8 = 10;
const ORGANIZATIONAL_UNIT: u8 = 11;

impl DistinguishedName {
    /// Decodes the contents of a Name SEQUENCE.
    pub(crate) fn from_der(value: untrusted::Input) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        value.read_all(Error::BadDer, |rdns| {
            while !rdns.at_end() {
                der::nested_of_mut(rdns, Tag::Set, Tag::Sequence, Error::BadDer, |atv| {
                    let oid = der::expect_tag_and_get_value(atv, Tag::OID)?;
                    let (tag, value) = der::read_tag_and_get_value(atv)?;
                    attributes.push(Attribute {
                        oid: oid.as_slice_less_safe().to_vec(),
                        value: decode_string(tag, value.as_slice_less_safe())?,
                    });
                    Ok(())
                })?;
            }
            Ok(())
        })?;

        Ok(Self {
            der: value.as_slice_less_safe().to_vec(),
            attributes,
        })
    }

    /// The DER encoding of the name's RDN sequence, without the outer
    /// SEQUENCE header.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Values of the organization (O) attribute.
    pub fn organizations(&self) -> impl Iterator<Item = &str> {
        self.values_of(ORGANIZATION)
    }

    /// The first common name (CN), if any.
    pub fn common_name(&self) -> Option<&str> {
        self.values_of(COMMON_NAME).next()
    }

    fn values_of(&self, id: u8) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(move |attr| attr.oid.split_last() == Some((&id, &ID_AT[..])))
            .map(|attr| attr.value.as_str())
    }
}

/// Renders in RFC 4514 order, most specific RDN first (`CN=...,O=...,C=DK`).
impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.attributes.iter().rev().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            match attr.oid.split_last() {
                Some((last, prefix)) if prefix == ID_AT => match *last {
                    COMMON_NAME => f.write_str("CN")?,
                    SERIAL_NUMBER => f.write_str("SERIALNUMBER")?,
                    COUNTRY => f.write_str("C")?,
                    LOCALITY => f.write_str("L")?,
                    STATE => f.write_str("ST")?,
                    ORGANIZATION => f.write_str("O")?,
                    ORGANIZATIONAL_UNIT => f.write_str("OU")?,
                    _ => write_dotted_oid(f, &attr.oid)?,
                },
                _ => write_dotted_oid(f, &attr.oid)?,
            }
            f.write_char('=')?;
            for c in attr.value.chars() {
                if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
                    f.write_char('\\')?;
                }
                f.write_char(c)?;
            }
        }
        Ok(())
    }
}

fn write_dotted_oid(f: &mut fmt::Formatter<'_>, oid: &[u8]) -> fmt::Result {
    let mut arcs = Vec::new();
    let mut acc: u64 = 0;
    for b in oid {
        acc = (acc << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
        }
    }
    let Some((first, rest)) = arcs.split_first() else {
        return Ok(());
    };
    let (a, b) = match *first {
        n if n < 40 => (0, n),
        n if n < 80 => (1, n - 40),
        n => (2, n - 80),
    };
    write!(f, "{}.{}", a, b)?;
    for arc in rest {
        write!(f, ".{}", arc)?;
    }
    Ok(())
}

fn decode_string(tag: u8, bytes: &[u8]) -> Result<String, Error> {
    const UTF8_STRING: u8 = 0x0C;
    const PRINTABLE_STRING: u8 = 0x13;
    const TELETEX_STRING: u8 = 0x14;
    const IA5_STRING: u8 = 0x16;
    const UNIVERSAL_STRING: u8 = 0x1C;
    const BMP_STRING: u8 = 0x1E;

    match tag {
        UTF8_STRING | PRINTABLE_STRING | IA5_STRING => {
            String::from_utf8(bytes.to_vec()).map_err(|_| Error::BadDer)
        }
        // T.61 is treated as Latin-1, which is what it holds in practice.
        TELETEX_STRING => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        BMP_STRING => {
            if bytes.len() % 2 != 0 {
                return Err(Error::BadDer);
            }
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .collect::<Result<String, _>>()
                .map_err(|_| Error::BadDer)
        }
        UNIVERSAL_STRING => {
            if bytes.len() % 4 != 0 {
                return Err(Error::BadDer);
            }
            bytes
                .chunks_exact(4)
                .map(|quad| char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])))
                .collect::<Option<String>>()
                .ok_or(Error::BadDer)
        }
        // Anything else is shown as hex, the RFC 4514 form for unknown types.
        _ => {
            let mut out = String::with_capacity(1 + bytes.len() * 2);
            out.push('#');
            for b in bytes {
                let _ = write!(out, "{:02x}", b);
            }
            Ok(out)
        }
    }
}
