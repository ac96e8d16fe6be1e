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

//! Implementation of reading and writing of DNS messages.

use std::fmt;

mod constants;
pub mod packet;
pub mod record;
pub use packet::Packet;
pub use record::{Filter, Record, RecordIter};

use constants::*;

////////////////////////////////////////////////////////////////////////
// SECTIONS                                                           //
////////////////////////////////////////////////////////////////////////

/// One of the four record groupings of a DNS message, in wire order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    /// Returns the section's bit in a [`Sections`] mask.
    pub(crate) fn mask(self) -> u8 {
        match self {
            Self::Question => 0x01,
            Self::Answer => 0x02,
            Self::Authority => 0x04,
            Self::Additional => 0x08,
        }
    }

    /// The inverse of [`Section::mask`].
    pub(crate) fn from_mask(mask: u8) -> Option<Self> {
        match mask {
            0x01 => Some(Self::Question),
            0x02 => Some(Self::Answer),
            0x04 => Some(Self::Authority),
            0x08 => Some(Self::Additional),
            _ => None,
        }
    }

    /// Returns the header offset of the section's record count.
    pub(crate) fn count_offset(self) -> usize {
        match self {
            Self::Question => QDCOUNT_START,
            Self::Answer => ANCOUNT_START,
            Self::Authority => NSCOUNT_START,
            Self::Additional => ARCOUNT_START,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Question => f.write_str("QUESTION"),
            Self::Answer => f.write_str("ANSWER"),
            Self::Authority => f.write_str("AUTHORITY"),
            Self::Additional => f.write_str("ADDITIONAL"),
        }
    }
}

/// A set of [`Section`]s, used to restrict a record [`Filter`].
///
/// The default (and [`Sections::ANY`]) admits every section.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sections(u8);

impl Sections {
    /// Admits every section.
    pub const ANY: Self = Self(0);

    /// Returns a set holding only `section`.
    pub fn just(section: Section) -> Self {
        Self(section.mask())
    }

    /// Returns the set extended with `section`.
    pub fn with(self, section: Section) -> Self {
        Self(self.0 | section.mask())
    }

    /// Returns whether records in `section` pass this set.
    pub(crate) fn admits(self, section: Section) -> bool {
        self.0 == 0 || self.0 & section.mask() != 0
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
