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

//! Implementation of presentation-form domain names and of the
//! on-the-wire name codec.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use arrayvec::ArrayVec;

use crate::error::{Error, Result};

pub(crate) mod wire;

/// The maximum length of a domain name in presentation form.
pub const MAX_NAME_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
pub const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME BUFFERS                                                       //
////////////////////////////////////////////////////////////////////////

/// A fixed-capacity buffer holding a domain name in presentation form
/// (dot-separated labels, e.g. `www.example.com.`).
///
/// Names travel through the resolver core in this form: query names
/// from the caller, search-list suffixes, hint-zone names, and names
/// expanded out of packets. The buffer is sized to the 255-octet
/// presentation limit and lives on the stack, so building and passing
/// names never allocates.
///
/// In accordance with [RFC 1034 § 3.1]:
///
/// * comparison and hashing are ASCII-case-insensitive, but
/// * case is preserved in the internal representation.
///
/// A name ending in a dot is *anchored* (fully qualified). The
/// [`NameBuf::anchor`] method appends the trailing dot when missing,
/// and [`NameBuf::cleave`] strips the leading label, which is how the
/// local host name becomes a default search suffix.
///
/// [RFC 1034 § 3.1]: https://tools.ietf.org/html/rfc1034#section-3.1
#[derive(Clone, Default)]
pub struct NameBuf {
    octets: ArrayVec<u8, MAX_NAME_LEN>,
}

impl NameBuf {
    /// Returns an empty `NameBuf`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a `NameBuf` holding the name of the DNS root, `.`.
    pub fn root() -> Self {
        let mut name = Self::new();
        name.octets.push(b'.');
        name
    }

    /// Returns the octets of the name.
    pub fn as_bytes(&self) -> &[u8] {
        &self.octets
    }

    /// Returns the length of the name in octets.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether the name is empty.
    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    /// Returns whether the name is anchored (ends with a dot).
    pub fn is_anchored(&self) -> bool {
        self.octets.last() == Some(&b'.')
    }

    /// Ensures that the name ends with a dot. An empty name is left
    /// untouched. This fails if the buffer is full.
    pub fn anchor(&mut self) -> Result<()> {
        if self.is_empty() || self.is_anchored() {
            Ok(())
        } else {
            self.octets.try_push(b'.').or(Err(Error::TooLong))
        }
    }

    /// Builds an anchored `NameBuf` from the given octets.
    pub fn anchored(src: &[u8]) -> Result<Self> {
        let mut name = Self::try_from(src)?;
        name.anchor()?;
        Ok(name)
    }

    /// Returns the suffix after the first internal dot: `a.b.c` yields
    /// `b.c`, while `a.` and `.` yield the empty name. Cleaving the
    /// local host name produces its parent domain.
    pub fn cleave(&self) -> Self {
        let mut out = Self::new();
        if self.octets.len() >= 2 {
            if let Some(i) = self.octets[1..].iter().position(|&b| b == b'.') {
                out.extend_truncated(&self.octets[i + 2..]);
            }
        }
        out
    }

    /// Appends as much of `octets` as fits in the remaining capacity,
    /// silently discarding the rest.
    pub(crate) fn extend_truncated(&mut self, octets: &[u8]) {
        let room = self.octets.remaining_capacity().min(octets.len());
        let _ = self.octets.try_extend_from_slice(&octets[..room]);
    }
}

impl TryFrom<&[u8]> for NameBuf {
    type Error = Error;

    fn try_from(octets: &[u8]) -> Result<Self> {
        let mut name = Self::new();
        name.octets
            .try_extend_from_slice(octets)
            .or(Err(Error::TooLong))?;
        Ok(name)
    }
}

impl FromStr for NameBuf {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(s.as_bytes())
    }
}

/// When a `NameBuf` is displayed, ASCII graphic characters pass
/// through and all other octets are escaped `\xyz`, where `xyz` is the
/// three-digit zero-padded decimal representation of the octet.
impl fmt::Display for NameBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &octet in self.octets.iter() {
            if octet.is_ascii_graphic() {
                write!(f, "{}", octet as char)?;
            } else {
                write!(f, "\\{:03}", octet)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NameBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

/// In accordance with RFC 1034 § 3.1 (clarified by RFC 4343),
/// comparison of names is ASCII-case-insensitive.
impl PartialEq for NameBuf {
    fn eq(&self, other: &Self) -> bool {
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for NameBuf {}

impl PartialEq<&str> for NameBuf {
    fn eq(&self, other: &&str) -> bool {
        self.octets.eq_ignore_ascii_case(other.as_bytes())
    }
}

impl Hash for NameBuf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // We have to hash in a case-insensitive manner to match our
        // implementations of [`PartialEq`] and [`Eq`].
        for octet in self.octets.iter().map(|octet| octet.to_ascii_lowercase()) {
            state.write_u8(octet);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
