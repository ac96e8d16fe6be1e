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

//! Implementation of the [`Packet`] type: an append-only DNS message
//! buffer with a compression dictionary.

use std::fmt;

use arrayvec::ArrayVec;

use super::constants::*;
use super::record::Record;
use super::Section;
use crate::class::Class;
use crate::error::{Error, Result};
use crate::name::{wire, NameBuf};
use crate::rr::{RecordData, Ttl, Type};

////////////////////////////////////////////////////////////////////////
// PACKETS                                                            //
////////////////////////////////////////////////////////////////////////

/// A DNS message held in a fixed-capacity buffer.
///
/// A `Packet` owns its octet buffer and a write cursor (`end`). The
/// twelve-octet header is always present; questions and resource
/// records are appended after it with [`Packet::push`], which keeps
/// the header's four section counts authoritative for the records the
/// buffer holds. Records must be pushed in RFC 1035 section order
/// (question, answer, authority, additional); the serialization order
/// within a packet is the push order and is what
/// [`Packet::grep`](super::record) observes.
///
/// Alongside the cursor the packet keeps a small *compression
/// dictionary*: the offsets at which up to [`DICT_SIZE`] pushed names
/// begin. Every name written by `push` is compressed against the
/// dictionary, so repeated suffixes collapse into two-octet pointers.
/// Once the dictionary is full, later names are still written (and
/// still compress against the registered ones) but are no longer
/// candidates for future matches.
///
/// A failed `push` restores `end` and the section counts to their
/// prior values. The dictionary is append-only and may then retain an
/// entry at or beyond `end`; the compressor ignores such entries.
///
/// Received messages are wrapped with [`Packet::from_bytes`], after
/// which the parsing and iteration methods apply. The cursor of a
/// received packet sits at the end of the message, so pushing into it
/// (for instance to sanitize a response) appends as usual.
pub struct Packet {
    data: Box<[u8]>,
    end: usize,
    dict: ArrayVec<u16, DICT_SIZE>,
}

impl Packet {
    /// Creates an empty packet with a buffer of `size` octets (at
    /// least the header size, at most 65,535; larger values are
    /// clamped). The header starts zeroed.
    pub fn new(size: usize) -> Result<Self> {
        if size < HEADER_SIZE {
            return Err(Error::NoBufs);
        }
        let size = size.min(MAX_PACKET_SIZE);
        Ok(Self {
            data: vec![0; size].into_boxed_slice(),
            end: HEADER_SIZE,
            dict: ArrayVec::new(),
        })
    }

    /// Wraps a received message in a packet. The message must contain
    /// at least a full header and no more than 65,535 octets.
    pub fn from_bytes(octets: &[u8]) -> Result<Self> {
        if octets.len() < HEADER_SIZE || octets.len() > MAX_PACKET_SIZE {
            return Err(Error::Malformed);
        }
        Ok(Self {
            data: octets.into(),
            end: octets.len(),
            dict: ArrayVec::new(),
        })
    }

    /// Returns the message written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.end]
    }

    /// Returns the offset of the write cursor, i.e. the length of the
    /// message.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns the capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    ////////////////////////////////////////////////////////////////////
    // HEADER ACCESS                                                  //
    ////////////////////////////////////////////////////////////////////

    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        self.u16_at(ID_START)
    }

    /// Sets the 16-bit ID of the message.
    pub fn set_id(&mut self, id: u16) {
        self.data[ID_START..ID_END].copy_from_slice(&id.to_be_bytes());
    }

    /// Returns whether the QR (query response) bit is set.
    pub fn qr(&self) -> bool {
        (self.data[QR_BYTE] & QR_MASK) != 0
    }

    /// Sets or clears the QR (query response) bit.
    pub fn set_qr(&mut self, qr: bool) {
        if qr {
            self.data[QR_BYTE] |= QR_MASK;
        } else {
            self.data[QR_BYTE] &= !QR_MASK;
        }
    }

    /// Returns the message's raw opcode.
    pub fn opcode(&self) -> u8 {
        (self.data[OPCODE_BYTE] & OPCODE_MASK) >> OPCODE_SHIFT
    }

    /// Returns whether the AA (authoritative answer) bit is set.
    pub fn aa(&self) -> bool {
        (self.data[AA_BYTE] & AA_MASK) != 0
    }

    /// Returns whether the TC (truncation) bit is set.
    pub fn tc(&self) -> bool {
        (self.data[TC_BYTE] & TC_MASK) != 0
    }

    /// Returns whether the RD (recursion desired) bit is set.
    pub fn rd(&self) -> bool {
        (self.data[RD_BYTE] & RD_MASK) != 0
    }

    /// Sets or clears the RD (recursion desired) bit.
    pub fn set_rd(&mut self, rd: bool) {
        if rd {
            self.data[RD_BYTE] |= RD_MASK;
        } else {
            self.data[RD_BYTE] &= !RD_MASK;
        }
    }

    /// Returns whether the RA (recursion available) bit is set.
    pub fn ra(&self) -> bool {
        (self.data[RA_BYTE] & RA_MASK) != 0
    }

    /// Returns the raw RCODE of the message.
    pub fn rcode(&self) -> u8 {
        self.data[RCODE_BYTE] & RCODE_MASK
    }

    /// Returns the record count of `section`, as recorded in the
    /// header.
    pub fn count(&self, section: Section) -> u16 {
        self.u16_at(section.count_offset())
    }

    /// Returns the total record count over all four sections.
    pub fn count_all(&self) -> u16 {
        self.count(Section::Question)
            .wrapping_add(self.count(Section::Answer))
            .wrapping_add(self.count(Section::Authority))
            .wrapping_add(self.count(Section::Additional))
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn bump_count(&mut self, section: Section) {
        let offset = section.count_offset();
        let count = self.u16_at(offset).wrapping_add(1);
        self.data[offset..offset + 2].copy_from_slice(&count.to_be_bytes());
    }

    ////////////////////////////////////////////////////////////////////
    // APPENDING QUESTIONS AND RECORDS                                //
    ////////////////////////////////////////////////////////////////////

    /// Appends a question or resource record to the message.
    ///
    /// The name `dn` is given in presentation form; it is compressed
    /// against the packet's dictionary and the resulting offset is
    /// registered for future compression. For [`Section::Question`],
    /// only the name, type, and class are written and `data` is
    /// ignored. For the other sections the TTL and the RDATA follow;
    /// passing `None` for `data` writes an empty RDATA.
    ///
    /// On failure the cursor and the section counts are left at their
    /// pre-call values.
    pub fn push(
        &mut self,
        section: Section,
        dn: &[u8],
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        data: Option<&RecordData>,
    ) -> Result<()> {
        let saved_end = self.end;
        let result = self.push_unchecked(section, dn, rr_type, class, ttl, data);
        if result.is_err() {
            self.end = saved_end;
        }
        result
    }

    /// The body of [`Packet::push`]; may leave the cursor advanced on
    /// failure.
    fn push_unchecked(
        &mut self,
        section: Section,
        dn: &[u8],
        rr_type: Type,
        class: Class,
        ttl: Ttl,
        data: Option<&RecordData>,
    ) -> Result<()> {
        self.push_name(dn)?;
        self.try_push_u16(rr_type.into())?;
        self.try_push_u16(class.into())?;

        if section == Section::Question {
            self.bump_count(section);
            return Ok(());
        }

        self.try_push_u32(ttl.into())?;
        match data {
            Some(data) => data.push(self)?,
            None => self.try_push_u16(0)?,
        }

        self.bump_count(section);
        Ok(())
    }

    /// Re-pushes a record parsed out of `src` into this packet: the
    /// owner name is expanded, the RDATA re-parsed, and both are
    /// written through [`Packet::push`] (re-compressing any embedded
    /// names against this packet's dictionary).
    pub fn copy_record(&mut self, record: &Record, src: &Packet) -> Result<()> {
        let owner = src.expand_name(record.dn_offset as usize)?;
        let data = if record.section == Section::Question {
            None
        } else {
            Some(RecordData::parse(record, src)?)
        };
        self.push(
            record.section,
            owner.as_bytes(),
            record.rr_type,
            record.class,
            record.ttl,
            data.as_ref(),
        )
    }

    /// Renders a record parsed out of this packet on one line, in
    /// master-file style: `owner [ttl] class type [rdata]`, with a
    /// leading `;` for question entries.
    pub fn print_record(&self, record: &Record) -> Result<String> {
        use std::fmt::Write;

        let mut out = String::new();
        if record.section == Section::Question {
            out.push(';');
        }
        let _ = write!(out, "{}", self.expand_name(record.dn_offset as usize)?);
        if record.section != Section::Question {
            let _ = write!(out, " {}", record.ttl);
        }
        let _ = write!(out, " {} {}", record.class, record.rr_type);
        if record.section != Section::Question {
            let _ = write!(out, " {}", RecordData::parse(record, self)?);
        }
        Ok(out)
    }

    ////////////////////////////////////////////////////////////////////
    // NAME CODEC ENTRY POINTS                                        //
    ////////////////////////////////////////////////////////////////////

    /// Encodes the presentation-form name `dn` into `dst`, compressing
    /// it against this packet. Returns the number of octets written.
    pub fn compress(&self, dn: &[u8], dst: &mut [u8]) -> Result<usize> {
        wire::compress(dst, dn, self.as_bytes(), &self.dict)
    }

    /// Expands the name at offset `src` of this packet into `dst` in
    /// presentation form, returning its full length (the copy is
    /// truncated if `dst` is too small).
    pub fn expand(&self, src: usize, dst: &mut [u8]) -> Result<usize> {
        wire::expand(dst, self.as_bytes(), src)
    }

    /// Expands the name at offset `src` of this packet into a fresh
    /// [`NameBuf`].
    pub fn expand_name(&self, src: usize) -> Result<NameBuf> {
        wire::expand_name(self.as_bytes(), src)
    }

    /// Advances past the name at offset `src` of this packet without
    /// expanding it, returning the offset of the following octet.
    pub fn skip_name(&self, src: usize) -> Result<usize> {
        wire::skip(self.as_bytes(), src)
    }

    /// Compresses and appends the name `dn` at the cursor, registering
    /// its offset in the dictionary. Names that collapsed to a bare
    /// pointer are not registered: dictionary entries must reference
    /// label octets.
    pub(crate) fn push_name(&mut self, dn: &[u8]) -> Result<()> {
        let (prior, tail) = self.data.split_at_mut(self.end);
        let len = wire::compress(tail, dn, prior, &self.dict)?;
        if tail[0] & 0xc0 != 0xc0 {
            let _ = self.dict.try_push(self.end as u16);
        }
        self.end += len;
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////
    // RAW WRITES                                                     //
    ////////////////////////////////////////////////////////////////////

    /// Appends `octets` at the cursor, failing with [`Error::NoBufs`]
    /// if the buffer has no room.
    pub(crate) fn try_push(&mut self, octets: &[u8]) -> Result<()> {
        if self.data.len() - self.end < octets.len() {
            return Err(Error::NoBufs);
        }
        self.data[self.end..self.end + octets.len()].copy_from_slice(octets);
        self.end += octets.len();
        Ok(())
    }

    /// Appends `value` in network byte order at the cursor.
    pub(crate) fn try_push_u16(&mut self, value: u16) -> Result<()> {
        self.try_push(&value.to_be_bytes())
    }

    /// Appends `value` in network byte order at the cursor.
    pub(crate) fn try_push_u32(&mut self, value: u32) -> Result<()> {
        self.try_push(&value.to_be_bytes())
    }

    /// Reserves two octets at the cursor (for a length field to be
    /// filled in later) and returns their offset.
    pub(crate) fn reserve_u16(&mut self) -> Result<usize> {
        let offset = self.end;
        self.try_push_u16(0)?;
        Ok(offset)
    }

    /// Overwrites the two octets at `offset` with `value` in network
    /// byte order.
    pub(crate) fn write_u16_at(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("aa", &self.aa())
            .field("tc", &self.tc())
            .field("rd", &self.rd())
            .field("ra", &self.ra())
            .field("rcode", &self.rcode())
            .field("qdcount", &self.count(Section::Question))
            .field("ancount", &self.count(Section::Answer))
            .field("nscount", &self.count(Section::Authority))
            .field("arcount", &self.count(Section::Additional))
            .field("end", &self.end)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::record::{Filter, RecordIter};

    #[test]
    fn new_packets_have_a_zeroed_header() {
        let packet = Packet::new(512).unwrap();
        assert_eq!(packet.as_bytes(), &[0; HEADER_SIZE]);
        assert_eq!(packet.end(), HEADER_SIZE);
    }

    #[test]
    fn new_rejects_buffers_smaller_than_the_header() {
        for size in 0..HEADER_SIZE {
            assert_eq!(Packet::new(size).unwrap_err(), Error::NoBufs);
        }
    }

    #[test]
    fn from_bytes_rejects_short_messages() {
        assert_eq!(
            Packet::from_bytes(&[0; HEADER_SIZE - 1]).unwrap_err(),
            Error::Malformed,
        );
    }

    #[test]
    fn header_accessors_work() {
        let mut packet = Packet::new(512).unwrap();
        packet.set_id(0x1234);
        packet.set_rd(true);
        packet.set_qr(true);
        assert_eq!(packet.id(), 0x1234);
        assert!(packet.rd());
        assert!(packet.qr());
        packet.set_qr(false);
        assert!(!packet.qr());
        assert!(!packet.ra());
        assert_eq!(packet.rcode(), 0);
    }

    #[test]
    fn a_question_serializes_to_the_rfc1035_example_bytes() {
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Question,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(0),
                None,
            )
            .unwrap();

        let expected: &[u8] = b"\x00\x00\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\
              \x03\x77\x77\x77\x07\x65\x78\x61\x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\
              \x00\x01\x00\x01";
        assert_eq!(packet.as_bytes(), expected);
    }

    #[test]
    fn answers_compress_against_the_question_name() {
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Question,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(0),
                None,
            )
            .unwrap();
        let cname = RecordData::Cname("example.com.".parse().unwrap());
        packet
            .push(
                Section::Answer,
                b"www.example.com.",
                Type::CNAME,
                Class::IN,
                Ttl::from(300),
                Some(&cname),
            )
            .unwrap();

        // The question ends at offset 33. The answer owner is a bare
        // pointer to the question name at offset 12, and the CNAME
        // target points into the question name at offset 16.
        let answer = &packet.as_bytes()[33..];
        assert_eq!(&answer[..2], b"\xc0\x0c");
        let rdata = &answer[2 + 2 + 2 + 4 + 2..];
        assert_eq!(rdata, b"\xc0\x10");

        // Expanding the CNAME target recovers the full name.
        let target = packet.expand_name(packet.end() - 2).unwrap();
        assert_eq!(target, "example.com.");
    }

    #[test]
    fn a_failed_push_rolls_the_cursor_back() {
        // Room for the question, but not for the answer.
        let mut packet = Packet::new(40).unwrap();
        packet
            .push(
                Section::Question,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(0),
                None,
            )
            .unwrap();
        let end = packet.end();

        let data = RecordData::A("192.0.2.1".parse().unwrap());
        let result = packet.push(
            Section::Answer,
            b"unrelated-name.example.com.",
            Type::A,
            Class::IN,
            Ttl::from(300),
            Some(&data),
        );

        assert!(result.is_err());
        assert_eq!(packet.end(), end);
        assert_eq!(packet.count(Section::Question), 1);
        assert_eq!(packet.count(Section::Answer), 0);
        assert_eq!(packet.count_all(), 1);
    }

    #[test]
    fn compression_does_not_change_what_expands() {
        // The same record pushed into a packet with a compression
        // opportunity and into a fresh one must expand identically.
        let mut compressed = Packet::new(512).unwrap();
        compressed
            .push(
                Section::Question,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(0),
                None,
            )
            .unwrap();
        let data = RecordData::Cname("www.example.com.".parse().unwrap());
        compressed
            .push(
                Section::Answer,
                b"alias.example.com.",
                Type::CNAME,
                Class::IN,
                Ttl::from(300),
                Some(&data),
            )
            .unwrap();

        let mut fresh = Packet::new(512).unwrap();
        fresh
            .push(
                Section::Answer,
                b"alias.example.com.",
                Type::CNAME,
                Class::IN,
                Ttl::from(300),
                Some(&data),
            )
            .unwrap();

        let grep_cname = |packet: &Packet| {
            let mut iter = RecordIter::new();
            let mut filter = Filter::new();
            filter.rr_type = Some(Type::CNAME);
            let record = packet.grep(&filter, &mut iter).unwrap().unwrap();
            (
                record.name(packet).unwrap(),
                RecordData::parse(&record, packet).unwrap(),
            )
        };

        assert_eq!(grep_cname(&compressed), grep_cname(&fresh));
    }

    #[test]
    fn copy_record_carries_records_between_packets() {
        let mut src = Packet::new(512).unwrap();
        src.push(
            Section::Question,
            b"www.example.com.",
            Type::A,
            Class::IN,
            Ttl::from(0),
            None,
        )
        .unwrap();
        let data = RecordData::A("192.0.2.1".parse().unwrap());
        src.push(
            Section::Answer,
            b"www.example.com.",
            Type::A,
            Class::IN,
            Ttl::from(300),
            Some(&data),
        )
        .unwrap();

        let mut dst = Packet::new(512).unwrap();
        let mut iter = RecordIter::new();
        while let Some(record) = src.grep(&Filter::new(), &mut iter) {
            dst.copy_record(&record.unwrap(), &src).unwrap();
        }

        assert_eq!(dst.count_all(), 2);
        let mut iter = RecordIter::new();
        let mut filter = Filter::new();
        filter.rr_type = Some(Type::A);
        filter.sections = super::super::Sections::just(Section::Answer);
        let record = dst.grep(&filter, &mut iter).unwrap().unwrap();
        assert_eq!(RecordData::parse(&record, &dst).unwrap(), data);
    }

    #[test]
    fn print_record_renders_master_file_lines() {
        let mut packet = Packet::new(512).unwrap();
        packet
            .push(
                Section::Question,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(0),
                None,
            )
            .unwrap();
        let data = RecordData::A("192.0.2.1".parse().unwrap());
        packet
            .push(
                Section::Answer,
                b"www.example.com.",
                Type::A,
                Class::IN,
                Ttl::from(300),
                Some(&data),
            )
            .unwrap();

        let mut iter = RecordIter::new();
        let question = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        let answer = packet.grep(&Filter::new(), &mut iter).unwrap().unwrap();
        assert_eq!(
            packet.print_record(&question).unwrap(),
            ";www.example.com. IN A",
        );
        assert_eq!(
            packet.print_record(&answer).unwrap(),
            "www.example.com. 300 IN A 192.0.2.1",
        );
    }
}
