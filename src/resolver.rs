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

//! Implementation of the [`Resolver`] handle that ties the shared
//! configuration, the hints table, and the randomness source
//! together.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::class::Class;
use crate::error::Result;
use crate::hints::{Hints, HintsIter};
use crate::message::{Packet, Section};
use crate::name::NameBuf;
use crate::resconf::{search, ResolvConf, SearchState};
use crate::rr::{Ttl, Type};

/// The buffer size of a freshly assembled query packet.
const QUERY_PACKET_SIZE: usize = 512;

/// The RNG callback a [`Resolver`] draws message IDs and rotation
/// offsets from.
pub type RngCallback = Box<dyn Fn() -> u32 + Send + Sync>;

////////////////////////////////////////////////////////////////////////
// RESOLVERS                                                          //
////////////////////////////////////////////////////////////////////////

/// A resolver instance: shared ownership of an immutable-after-setup
/// [`ResolvConf`] and [`Hints`], plus an instance-level randomness
/// source.
///
/// The `Resolver` itself performs no I/O. It is the seam between the
/// outer query driver (sockets, retransmission, caching) and this
/// crate's core: it assembles question packets, enumerates search-list
/// candidates, and selects nameserver candidates from the hints table.
/// Several resolvers may share one configuration and one hints table;
/// the shared values are released when the last owner is dropped.
///
/// The randomness source is a per-instance callback rather than a
/// process-wide hook, so embedders can supply a deterministic source
/// (or a hardened one) without global state. The default draws from
/// [`rand::random`].
pub struct Resolver {
    resconf: Arc<ResolvConf>,
    hints: Arc<Hints>,
    rng: RngCallback,
}

impl Resolver {
    /// Creates a resolver over the given shared configuration and
    /// hints, using the default randomness source.
    pub fn new(resconf: Arc<ResolvConf>, hints: Arc<Hints>) -> Self {
        Self::with_rng(resconf, hints, Box::new(rand::random::<u32>))
    }

    /// Creates a resolver with an explicit randomness source.
    pub fn with_rng(resconf: Arc<ResolvConf>, hints: Arc<Hints>, rng: RngCallback) -> Self {
        Self {
            resconf,
            hints,
            rng,
        }
    }

    /// Returns the resolver's configuration.
    pub fn resconf(&self) -> &ResolvConf {
        &self.resconf
    }

    /// Returns the resolver's hints table.
    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    /// Assembles a question packet for `qname` (anchored first) with a
    /// random message ID. The RD bit follows `options.recursive`.
    pub fn query(&self, qname: &[u8], qtype: Type) -> Result<Packet> {
        let mut name = NameBuf::try_from(qname)?;
        name.anchor()?;

        let mut packet = Packet::new(QUERY_PACKET_SIZE)?;
        packet.set_id((self.rng)() as u16);
        packet.set_rd(self.resconf.options.recursive);
        packet.push(
            Section::Question,
            name.as_bytes(),
            qtype,
            Class::IN,
            Ttl::from(0),
            None,
        )?;
        Ok(packet)
    }

    /// Produces the next search-list candidate for `qname`; see
    /// [`search`].
    pub fn search(&self, qname: &[u8], state: &mut SearchState) -> Option<NameBuf> {
        search(qname, &self.resconf, state)
    }

    /// Fills `out` with nameserver candidates for the zone named by
    /// `iter`, resuming where the previous call stopped; see
    /// [`Hints::grep`].
    pub fn servers(&self, out: &mut [SocketAddr], iter: &mut HintsIter) -> usize {
        self.hints.grep(out, iter, || (self.rng)())
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resconf", &self.resconf)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
