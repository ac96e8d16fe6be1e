// Copyright 2025 the respite authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`RecordData`] registry of RR types.

use std::fmt::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr};

use super::Type;
use crate::error::{Error, Result};
use crate::message::record::Record;
use crate::message::Packet;
use crate::name::NameBuf;
use crate::util::nibble_to_ascii_hex_digit;

/// The largest TXT chunk payload; chunks carry a one-octet length.
const MAX_CHUNK_LEN: usize = 255;

////////////////////////////////////////////////////////////////////////
// RECORD DATA                                                        //
////////////////////////////////////////////////////////////////////////

/// The RDATA of a resource record, decoded by type.
///
/// Each variant covers one of the RR types from STD 13 ([RFC 1035])
/// and its IPv6 companion ([RFC 3596]) that a stub resolver routinely
/// handles. RDATA of any other type round-trips through the
/// [`Opaque`](RecordData::Opaque) variant untouched.
///
/// A `RecordData` is produced from a packet by [`RecordData::parse`]
/// and serialized into a packet by [`Packet::push`]. Serialization
/// frames the RDATA with its two-octet RDLENGTH; for the types that
/// embed domain names the length is computed after the name has been
/// compressed against the packet.
///
/// [RFC 1035]: https://datatracker.ietf.org/doc/html/rfc1035
/// [RFC 3596]: https://datatracker.ietf.org/doc/html/rfc3596
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordData {
    /// An IPv4 host address (RFC 1035 § 3.4.1).
    A(Ipv4Addr),

    /// An IPv6 host address (RFC 3596 § 2.2).
    Aaaa(Ipv6Addr),

    /// An authoritative name server (RFC 1035 § 3.3.11).
    Ns(NameBuf),

    /// The canonical name for an alias (RFC 1035 § 3.3.1).
    Cname(NameBuf),

    /// A mail exchange with its preference (RFC 1035 § 3.3.9).
    Mx { preference: u16, exchange: NameBuf },

    /// Text data: the concatenated contents of the record's
    /// `<character-string>` chunks (RFC 1035 § 3.3.14).
    Txt(Vec<u8>),

    /// RDATA of a type this library does not interpret, kept as raw
    /// octets (RFC 3597 § 3).
    Opaque(Vec<u8>),
}

impl RecordData {
    /// Decodes the RDATA of `record`, which must have been parsed from
    /// `packet`. Embedded domain names are expanded; unknown types are
    /// preserved opaquely.
    pub fn parse(record: &Record, packet: &Packet) -> Result<Self> {
        let rdata = record.rdata(packet);
        match record.rr_type {
            Type::A => {
                let octets: [u8; 4] = rdata.try_into().or(Err(Error::Malformed))?;
                Ok(Self::A(octets.into()))
            }
            Type::AAAA => {
                let octets: [u8; 16] = rdata.try_into().or(Err(Error::Malformed))?;
                Ok(Self::Aaaa(octets.into()))
            }
            Type::NS => Ok(Self::Ns(packet.expand_name(record.rd_offset as usize)?)),
            Type::CNAME => Ok(Self::Cname(packet.expand_name(record.rd_offset as usize)?)),
            Type::MX => {
                if rdata.len() < 3 {
                    return Err(Error::Malformed);
                }
                let preference = u16::from_be_bytes([rdata[0], rdata[1]]);
                let exchange = packet.expand_name(record.rd_offset as usize + 2)?;
                Ok(Self::Mx {
                    preference,
                    exchange,
                })
            }
            Type::TXT => {
                let mut data = Vec::with_capacity(rdata.len());
                let mut offset = 0;
                while offset < rdata.len() {
                    let len = rdata[offset] as usize;
                    offset += 1;
                    if rdata.len() - offset < len {
                        return Err(Error::Malformed);
                    }
                    data.extend_from_slice(&rdata[offset..offset + len]);
                    offset += len;
                }
                Ok(Self::Txt(data))
            }
            _ => Ok(Self::Opaque(rdata.to_vec())),
        }
    }

    /// Serializes the RDATA, including its RDLENGTH framing, at the
    /// current end of `packet`. The cursor is not restored on failure;
    /// [`Packet::push`] handles the rollback.
    pub(crate) fn push(&self, packet: &mut Packet) -> Result<()> {
        match self {
            Self::A(address) => {
                packet.try_push_u16(4)?;
                packet.try_push(&address.octets())
            }
            Self::Aaaa(address) => {
                packet.try_push_u16(16)?;
                packet.try_push(&address.octets())
            }
            Self::Ns(name) | Self::Cname(name) => {
                let start = packet.reserve_u16()?;
                packet.push_name(name.as_bytes())?;
                packet.write_u16_at(start, (packet.end() - start - 2) as u16);
                Ok(())
            }
            Self::Mx {
                preference,
                exchange,
            } => {
                let start = packet.reserve_u16()?;
                packet.try_push_u16(*preference)?;
                packet.push_name(exchange.as_bytes())?;
                packet.write_u16_at(start, (packet.end() - start - 2) as u16);
                Ok(())
            }
            Self::Txt(data) => {
                let nchunks = if data.is_empty() {
                    1
                } else {
                    (data.len() + MAX_CHUNK_LEN - 1) / MAX_CHUNK_LEN
                };
                let rdlength = data.len() + nchunks;
                if rdlength > u16::MAX as usize {
                    return Err(Error::TooLong);
                }
                packet.try_push_u16(rdlength as u16)?;
                if data.is_empty() {
                    packet.try_push(&[0])
                } else {
                    for chunk in data.chunks(MAX_CHUNK_LEN) {
                        packet.try_push(&[chunk.len() as u8])?;
                        packet.try_push(chunk)?;
                    }
                    Ok(())
                }
            }
            Self::Opaque(data) => {
                if data.len() > u16::MAX as usize {
                    return Err(Error::TooLong);
                }
                packet.try_push_u16(data.len() as u16)?;
                packet.try_push(data)
            }
        }
    }

    /// Returns the RR type this data serializes as, or `None` for
    /// opaque data (whose type tag travels separately).
    pub fn rr_type(&self) -> Option<Type> {
        match self {
            Self::A(_) => Some(Type::A),
            Self::Aaaa(_) => Some(Type::AAAA),
            Self::Ns(_) => Some(Type::NS),
            Self::Cname(_) => Some(Type::CNAME),
            Self::Mx { .. } => Some(Type::MX),
            Self::Txt(_) => Some(Type::TXT),
            Self::Opaque(_) => None,
        }
    }
}

/// The textual forms follow master-file conventions: dotted-quad and
/// canonical IPv6 addresses, `preference exchange` for MX, quoted text
/// for TXT (re-chunked every 256 octets, with non-printing octets,
/// quotes, and backslashes escaped `\ddd`), and the RFC 3597 § 5
/// `\# length hex` form for opaque data.
impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::A(address) => address.fmt(f),
            Self::Aaaa(address) => address.fmt(f),
            Self::Ns(name) | Self::Cname(name) => name.fmt(f),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            Self::Txt(data) => {
                f.write_char('"')?;
                for (i, &octet) in data.iter().enumerate() {
                    if i > 0 && i % 256 == 0 {
                        f.write_str("\" \"")?;
                    }
                    if octet < 32 || octet > 126 || octet == b'"' || octet == b'\\' {
                        write!(f, "\\{:03}", octet)?;
                    } else {
                        f.write_char(octet as char)?;
                    }
                }
                f.write_char('"')
            }
            Self::Opaque(data) => {
                write!(f, "\\# {}", data.len())?;
                if !data.is_empty() {
                    f.write_char(' ')?;
                    for octet in data.iter() {
                        f.write_char(char::from(nibble_to_ascii_hex_digit((octet & 0xf0) >> 4)))?;
                        f.write_char(char::from(nibble_to_ascii_hex_digit(octet & 0xf)))?;
                    }
                }
                Ok(())
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::message::record::{Filter, RecordIter};
    use crate::message::Section;
    use crate::rr::Ttl;

    /// Pushes an answer with the given data into a fresh packet and
    /// parses it back out.
    fn round_trip(rr_type: Type, data: &RecordData) -> RecordData {
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Answer,
                b"test.example.",
                rr_type,
                Class::IN,
                Ttl::from(300),
                Some(data),
            )
            .unwrap();

        let mut iter = RecordIter::new();
        let record = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        RecordData::parse(&record, &packet).unwrap()
    }

    #[test]
    fn a_records_round_trip() {
        let data = RecordData::A("192.0.2.1".parse().unwrap());
        assert_eq!(round_trip(Type::A, &data), data);
    }

    #[test]
    fn aaaa_records_round_trip() {
        let data = RecordData::Aaaa("2001:db8::1".parse().unwrap());
        assert_eq!(round_trip(Type::AAAA, &data), data);
    }

    #[test]
    fn mx_records_round_trip() {
        let data = RecordData::Mx {
            preference: 10,
            exchange: "mail.example.".parse().unwrap(),
        };
        assert_eq!(round_trip(Type::MX, &data), data);
    }

    #[test]
    fn unknown_types_round_trip_opaquely() {
        let data = RecordData::Opaque(b"\x12\x34\x56".to_vec());
        assert_eq!(round_trip(Type::from(0xff00), &data), data);
    }

    #[test]
    fn long_txt_data_is_rechunked() {
        let payload = vec![b'x'; 300];
        let data = RecordData::Txt(payload.clone());

        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Answer,
                b"test.example.",
                Type::TXT,
                Class::IN,
                Ttl::from(300),
                Some(&data),
            )
            .unwrap();

        let mut iter = RecordIter::new();
        let record = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        // 300 octets of content require two chunks: 255 + 45.
        assert_eq!(record.rd_len, 302);
        let rdata = record.rdata(&packet);
        assert_eq!(rdata[0], 255);
        assert_eq!(rdata[256], 45);
        assert_eq!(RecordData::parse(&record, &packet).unwrap(), data);
    }

    #[test]
    fn empty_txt_data_serializes_one_null_chunk() {
        let data = RecordData::Txt(Vec::new());
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Answer,
                b"test.example.",
                Type::TXT,
                Class::IN,
                Ttl::from(300),
                Some(&data),
            )
            .unwrap();

        let mut iter = RecordIter::new();
        let record = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        assert_eq!(record.rdata(&packet), b"\x00");
    }

    #[test]
    fn txt_parse_rejects_truncated_chunks() {
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Answer,
                b"test.example.",
                Type::TXT,
                Class::IN,
                Ttl::from(300),
                Some(&RecordData::Opaque(b"\x05ab".to_vec())),
            )
            .unwrap();

        let mut iter = RecordIter::new();
        let record = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        assert_eq!(
            RecordData::parse(&record, &packet),
            Err(Error::Malformed),
        );
    }

    #[test]
    fn display_forms_follow_master_file_conventions() {
        let a = RecordData::A("192.0.2.1".parse().unwrap());
        assert_eq!(a.to_string(), "192.0.2.1");

        let aaaa = RecordData::Aaaa("2001:db8::1".parse().unwrap());
        assert_eq!(aaaa.to_string(), "2001:db8::1");

        let mx = RecordData::Mx {
            preference: 10,
            exchange: "mail.example.".parse().unwrap(),
        };
        assert_eq!(mx.to_string(), "10 mail.example.");

        let txt = RecordData::Txt(b"v=spf1 \"quoted\\\"".to_vec());
        assert_eq!(txt.to_string(), "\"v=spf1 \\034quoted\\092\\034\"");

        let opaque = RecordData::Opaque(b"\xc0\x00\x02\x01".to_vec());
        assert_eq!(opaque.to_string(), "\\# 4 c0000201");
    }

    #[test]
    fn long_txt_display_reopens_the_quoted_string() {
        let txt = RecordData::Txt(vec![b'x'; 257]).to_string();
        assert!(txt.starts_with('"'));
        assert!(txt.ends_with('"'));
        assert!(txt.contains("\" \""));
    }
}
