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

//! Implementation of record parsing and the restartable record
//! iterator.

use super::constants::HEADER_SIZE;
use super::{Packet, Section, Sections};
use crate::class::Class;
use crate::error::{Error, Result};
use crate::name::NameBuf;
use crate::rr::{Ttl, Type};

////////////////////////////////////////////////////////////////////////
// RECORDS                                                            //
////////////////////////////////////////////////////////////////////////

/// The geometry of one question or resource record within a packet.
///
/// A `Record` carries offsets and lengths into the packet it was
/// parsed from rather than decoded values, so parsing a record never
/// copies name or RDATA octets. The owner name is expanded on demand
/// with [`Record::name`], and the RDATA is decoded with
/// [`RecordData::parse`](crate::rr::RecordData::parse).
///
/// For question entries `ttl` is zero and the RDATA fields are empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Record {
    /// The offset of the owner name.
    pub dn_offset: u16,

    /// The length of the owner name as stored (compressed) on the
    /// wire.
    pub dn_len: u16,

    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,

    /// The offset of the RDATA (zero for questions).
    pub rd_offset: u16,

    /// The length of the RDATA (zero for questions).
    pub rd_len: u16,

    pub section: Section,
}

impl Record {
    /// Expands the record's owner name out of `packet`.
    pub fn name(&self, packet: &Packet) -> Result<NameBuf> {
        packet.expand_name(self.dn_offset as usize)
    }

    /// Returns the record's raw RDATA octets within `packet`.
    pub fn rdata<'a>(&self, packet: &'a Packet) -> &'a [u8] {
        let start = self.rd_offset as usize;
        &packet.as_bytes()[start..start + self.rd_len as usize]
    }

    /// Returns the number of octets the record occupies on the wire.
    fn wire_len(&self) -> usize {
        let fixed = self.dn_len as usize + 4;
        if self.section == Section::Question {
            fixed
        } else {
            fixed + 4 + 2 + self.rd_len as usize
        }
    }
}

impl Packet {
    /// Parses the record at `offset`, which lies in `section` of the
    /// message. Question entries stop after the class field; for the
    /// other sections the TTL (with its top bit cleared) and the RDATA
    /// bounds are read and validated against the end of the message.
    pub fn parse_record(&self, offset: usize, section: Section) -> Result<Record> {
        let data = self.as_bytes();
        let after_name = self.skip_name(offset)?;
        if data.len() - after_name < 4 {
            return Err(Error::Malformed);
        }

        let rr_type = u16::from_be_bytes([data[after_name], data[after_name + 1]]).into();
        let class = u16::from_be_bytes([data[after_name + 2], data[after_name + 3]]).into();
        let mut record = Record {
            dn_offset: offset as u16,
            dn_len: (after_name - offset) as u16,
            rr_type,
            class,
            ttl: Ttl::from(0),
            rd_offset: 0,
            rd_len: 0,
            section,
        };

        if section == Section::Question {
            return Ok(record);
        }

        let p = after_name + 4;
        if data.len() - p < 6 {
            return Err(Error::Malformed);
        }
        let raw_ttl = u32::from_be_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]]);
        record.ttl = Ttl::from(raw_ttl);
        record.rd_len = u16::from_be_bytes([data[p + 4], data[p + 5]]);
        record.rd_offset = (p + 6) as u16;

        if data.len() - (p + 6) < record.rd_len as usize {
            return Err(Error::Malformed);
        }
        Ok(record)
    }

    /// Parses the record at `offset` and returns the offset of the
    /// record after it.
    pub fn skip_record(&self, offset: usize, section: Section) -> Result<usize> {
        let record = self.parse_record(offset, section)?;
        Ok(offset + record.wire_len())
    }
}

////////////////////////////////////////////////////////////////////////
// RECORD ITERATION                                                   //
////////////////////////////////////////////////////////////////////////

/// A filter over the records yielded by [`Packet::grep`].
///
/// All fields default to "match anything". `rr_type` and `class` also
/// treat their `ANY` values as wildcards, and `name` matches the
/// expanded owner name case-insensitively, so it should be anchored.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub sections: Sections,
    pub rr_type: Option<Type>,
    pub class: Option<Class>,
    pub name: Option<NameBuf>,
}

impl Filter {
    /// Returns a filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The state of a restartable walk over a packet's records.
///
/// The cursor is four plain fields — the current section's bit, the
/// record index within that section, the next byte offset, and a
/// running count of yielded records — so a driver can park it across
/// I/O suspensions and resume iteration without heap allocation.
#[derive(Clone, Copy, Debug)]
pub struct RecordIter {
    section: u8,
    index: u16,
    next: u16,
    carry: u16,
}

impl RecordIter {
    /// Returns a cursor positioned at the first record of the message.
    pub fn new() -> Self {
        Self {
            section: Section::Question.mask(),
            index: 0,
            next: HEADER_SIZE as u16,
            carry: 0,
        }
    }

    /// Returns the number of records yielded through this cursor so
    /// far.
    pub fn yielded(&self) -> u16 {
        self.carry
    }
}

impl Default for RecordIter {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    /// Yields the next record matching `filter`, advancing `iter`.
    ///
    /// Sections are scanned in wire order; the section counts in the
    /// header determine how many records each section holds. Records
    /// failing the filter are skipped. When a record cannot be parsed,
    /// the error is yielded once and the cursor moves to the end of
    /// the message, so resumed calls return `None` rather than hitting
    /// the same record again. `None` means the walk is complete.
    pub fn grep(&self, filter: &Filter, iter: &mut RecordIter) -> Option<Result<Record>> {
        loop {
            if iter.next as usize >= self.end() {
                return None;
            }
            let section = Section::from_mask(iter.section)?;
            if iter.index >= self.count(section) {
                iter.section <<= 1;
                iter.index = 0;
                continue;
            }

            let record = match self.parse_record(iter.next as usize, section) {
                Ok(record) => record,
                Err(err) => {
                    iter.next = self.end() as u16;
                    return Some(Err(err));
                }
            };
            iter.next += record.wire_len() as u16;
            iter.index += 1;

            if !filter.sections.admits(section) {
                continue;
            }
            if let Some(rr_type) = filter.rr_type {
                if rr_type != Type::ANY && record.rr_type != rr_type {
                    continue;
                }
            }
            if let Some(class) = filter.class {
                if class != Class::ANY && record.class != class {
                    continue;
                }
            }
            if let Some(want) = &filter.name {
                let owner = match record.name(self) {
                    Ok(owner) => owner,
                    Err(err) => {
                        iter.next = self.end() as u16;
                        return Some(Err(err));
                    }
                };
                if owner != *want {
                    continue;
                }
            }

            iter.carry = iter.carry.wrapping_add(1);
            return Some(Ok(record));
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
