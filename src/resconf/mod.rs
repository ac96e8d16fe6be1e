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

//! Implementation of the resolver configuration and its
//! resolv.conf-style loader.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use arrayvec::ArrayVec;
use log::{debug, trace};

use crate::error::Result;
use crate::name::NameBuf;
use crate::util::Caseless;

mod search;
pub use search::{search, SearchState};

/// The maximum number of nameserver addresses kept, as with the
/// classic resolver's MAXNS.
pub const MAX_NAMESERVERS: usize = 3;

/// The maximum number of search-list suffixes kept.
pub const MAX_SEARCH: usize = 4;

/// The maximum number of lookup-order entries kept.
const MAX_LOOKUPS: usize = 4;

/// The maximum number of words examined on a configuration line; the
/// remainder of the line is discarded.
const MAX_WORDS: usize = 6;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION MODEL                                                //
////////////////////////////////////////////////////////////////////////

/// One source consulted during name lookup, in `lookup` order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// The local hosts file.
    File,

    /// The DNS.
    Bind,
}

/// The `options` settings of a [`ResolvConf`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Options {
    pub edns0: bool,

    /// The dot-count threshold at or above which a query name is tried
    /// as-is before the search list is applied.
    pub ndots: u8,

    pub recursive: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            edns0: false,
            ndots: 1,
            recursive: false,
        }
    }
}

/// A typed resolver configuration in the classic resolv.conf mold.
///
/// A configuration is immutable after setup: the owning resolver
/// shares it read-only (behind an [`Arc`](std::sync::Arc)), so the
/// loader methods take `&mut self` and are meant to run before the
/// configuration is published.
///
/// [`ResolvConf::default`] supplies the standard initial values
/// (lookup order `bind` then `file`, `ndots:1`, wildcard interface).
/// [`ResolvConf::new`] additionally derives a search suffix from the
/// local host name by anchoring it and cleaving off the first label;
/// a host name without an internal dot contributes nothing.
#[derive(Clone, Debug)]
pub struct ResolvConf {
    /// Nameserver addresses in configuration order.
    pub nameservers: ArrayVec<SocketAddr, MAX_NAMESERVERS>,

    /// Search-list suffixes, each anchored.
    pub search: ArrayVec<NameBuf, MAX_SEARCH>,

    /// Lookup sources in the order they should be consulted.
    pub lookup: ArrayVec<Lookup, MAX_LOOKUPS>,

    pub options: Options,

    /// The local address to originate queries from.
    pub interface: SocketAddr,
}

impl Default for ResolvConf {
    fn default() -> Self {
        let mut lookup = ArrayVec::new();
        lookup.push(Lookup::Bind);
        lookup.push(Lookup::File);
        Self {
            nameservers: ArrayVec::new(),
            search: ArrayVec::new(),
            lookup,
            options: Options::default(),
            interface: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }
}

impl ResolvConf {
    /// Creates a configuration with the default settings and a search
    /// suffix derived from the local host name.
    pub fn new() -> Result<Self> {
        let mut conf = Self::default();

        let hostname = nix::unistd::gethostname()
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
        let hostname = hostname.to_string_lossy();
        let mut name = NameBuf::new();
        name.extend_truncated(hostname.as_bytes());
        let _ = name.anchor();
        let suffix = name.cleave();
        if !suffix.is_empty() {
            conf.search.push(suffix);
        }

        Ok(conf)
    }

    /// Loads configuration directives from `source`, which is rewound
    /// first. Unrecognized keywords, unparsable addresses, and
    /// overlong lines are skipped; I/O errors are passed through.
    pub fn load<R: io::Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        source.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(source);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            self.load_line(&line);
        }
        debug!(
            "resolv.conf loaded: {} nameservers, {} search suffixes, ndots:{}",
            self.nameservers.len(),
            self.search.len(),
            self.options.ndots,
        );
        Ok(())
    }

    /// Loads configuration directives from the file at `path`.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut file = File::open(path)?;
        self.load(&mut file)
    }

    /// Applies a single configuration line.
    fn load_line(&mut self, line: &str) {
        let line = match line.find(|ch| ch == '#' || ch == ';') {
            Some(comment) => &line[..comment],
            None => line,
        };
        let words: ArrayVec<&str, MAX_WORDS> = line
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .filter(|word| !word.is_empty())
            .take(MAX_WORDS)
            .collect();
        if words.len() < 2 {
            return;
        }

        match keyword(words[0]) {
            Some(Keyword::Nameserver) => {
                if self.nameservers.is_full() {
                    return;
                }
                if let Some(address) = parse_address(words[1]) {
                    self.nameservers.push(SocketAddr::new(address, 53));
                }
            }
            Some(Keyword::Domain) | Some(Keyword::Search) => {
                self.search.clear();
                for word in &words[1..] {
                    if self.search.is_full() {
                        break;
                    }
                    if let Ok(suffix) = NameBuf::anchored(word.as_bytes()) {
                        self.search.push(suffix);
                    }
                }
            }
            Some(Keyword::Lookup) => {
                for word in &words[1..] {
                    if self.lookup.is_full() {
                        break;
                    }
                    match keyword(word) {
                        Some(Keyword::File) => self.lookup.push(Lookup::File),
                        Some(Keyword::Bind) => self.lookup.push(Lookup::Bind),
                        _ => {}
                    }
                }
            }
            Some(Keyword::Options) => {
                for word in &words[1..] {
                    match keyword(word) {
                        Some(Keyword::Edns0) => self.options.edns0 = true,
                        Some(Keyword::Recursive) => self.options.recursive = true,
                        Some(Keyword::Ndots) => {
                            self.options.ndots = leading_number(&word["ndots:".len()..]).min(255) as u8;
                        }
                        _ => {}
                    }
                }
            }
            Some(Keyword::Interface) => {
                let port = words.get(2).map_or(0, |word| leading_number(word).min(65535) as u16);
                if let Some(address) = parse_address(words[1]) {
                    self.interface = SocketAddr::new(address, port);
                }
            }
            _ => trace!("resolv.conf: skipping unrecognized line {:?}", words[0]),
        }
    }
}

/// Emits the configuration back in resolv.conf syntax.
impl fmt::Display for ResolvConf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for nameserver in &self.nameservers {
            writeln!(f, "nameserver {}", nameserver.ip())?;
        }

        f.write_str("search")?;
        for suffix in &self.search {
            write!(f, " {}", suffix)?;
        }
        f.write_str("\n")?;

        f.write_str("lookup")?;
        for lookup in &self.lookup {
            match lookup {
                Lookup::Bind => f.write_str(" bind")?,
                Lookup::File => f.write_str(" file")?,
            }
        }
        f.write_str("\n")?;

        write!(f, "options ndots:{}", self.options.ndots)?;
        if self.options.edns0 {
            f.write_str(" edns0")?;
        }
        if self.options.recursive {
            f.write_str(" recursive")?;
        }
        f.write_str("\n")?;

        writeln!(f, "interface {} {}", self.interface.ip(), self.interface.port())
    }
}

////////////////////////////////////////////////////////////////////////
// LINE PARSING HELPERS                                               //
////////////////////////////////////////////////////////////////////////

/// The keywords of the configuration syntax; sub-keywords (`file`,
/// `bind`, the `options` settings) share the table.
enum Keyword {
    Nameserver,
    Domain,
    Search,
    Lookup,
    File,
    Bind,
    Options,
    Edns0,
    Ndots,
    Recursive,
    Interface,
}

fn keyword(word: &str) -> Option<Keyword> {
    match Caseless(word) {
        Caseless("nameserver") => Some(Keyword::Nameserver),
        Caseless("domain") => Some(Keyword::Domain),
        Caseless("search") => Some(Keyword::Search),
        Caseless("lookup") => Some(Keyword::Lookup),
        Caseless("file") => Some(Keyword::File),
        Caseless("bind") => Some(Keyword::Bind),
        Caseless("options") => Some(Keyword::Options),
        Caseless("edns0") => Some(Keyword::Edns0),
        Caseless("recursive") => Some(Keyword::Recursive),
        Caseless("interface") => Some(Keyword::Interface),
        _ => {
            if word
                .get(..6)
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case("ndots:"))
            {
                Some(Keyword::Ndots)
            } else {
                None
            }
        }
    }
}

/// Parses an IP address, inferring the family from the presence of a
/// colon.
fn parse_address(word: &str) -> Option<IpAddr> {
    if word.contains(':') {
        word.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    } else {
        word.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    }
}

/// Folds the leading decimal digits of `word` into a number,
/// saturating; a word with no leading digits yields zero.
fn leading_number(word: &str) -> u32 {
    word.bytes()
        .take_while(|octet| octet.is_ascii_digit())
        .fold(0u32, |n, octet| {
            n.saturating_mul(10).saturating_add((octet - b'0') as u32)
        })
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
