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

//! Implementation of the crate-wide [`Error`] type.

use std::fmt;
use std::io;

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// The error kinds surfaced at the library boundary.
#[derive(Debug)]
pub enum Error {
    /// Wire data was truncated, or a label octet used one of the
    /// reserved tag bit patterns (`01` or `10`).
    Malformed,

    /// A destination buffer was too small, or a label or domain name
    /// exceeded its wire-format length limit.
    TooLong,

    /// Compression-pointer traversal exceeded the hop budget.
    PointerLoop,

    /// A packet buffer has no room left for the requested write.
    NoBufs,

    /// An I/O error from the configuration loader, passed through.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed wire data"),
            Self::TooLong => f.write_str("buffer too small or name too long"),
            Self::PointerLoop => f.write_str("compression pointer limit exceeded"),
            Self::NoBufs => f.write_str("no buffer space available"),
            Self::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Two `Io` errors compare equal when their [`io::ErrorKind`]s match;
/// this is for the benefit of tests and callers that switch on kinds.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Malformed, Self::Malformed) => true,
            (Self::TooLong, Self::TooLong) => true,
            (Self::PointerLoop, Self::PointerLoop) => true,
            (Self::NoBufs, Self::NoBufs) => true,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

/// The type returned by fallible operations throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
