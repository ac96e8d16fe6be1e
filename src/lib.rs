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

//! Core primitives for a restartable, allocation-light DNS stub
//! resolver.
//!
//! This crate provides the pieces an embeddable resolver driver is
//! built from, without doing any I/O itself:
//!
//! * the on-the-wire domain name codec, including pointer-based
//!   compression against a packet in progress ([`name`]);
//! * an append-only DNS message buffer that keeps RFC 1035 section
//!   order, maintains a compression dictionary, and exposes a
//!   restartable, filtering record iterator ([`message`]);
//! * decoded RDATA for the common record types, with an opaque
//!   fallback for the rest ([`rr`]);
//! * a typed resolv.conf-style configuration with its loader and the
//!   ndots-driven search-list generator ([`resconf`]);
//! * a nameserver hints table that adaptively benches failing servers
//!   and rotates among healthy ones ([`hints`]); and
//! * the [`Resolver`](resolver::Resolver) handle tying the shared
//!   pieces together.
//!
//! Everything stateful that a driver must suspend around — the record
//! iterator, the search-list token, the hints cursor — is plain,
//! copyable data rather than a closure, so a driver can park it while
//! it waits for the network and resume without allocating.

pub mod class;
mod error;
pub mod hints;
pub mod message;
pub mod name;
pub mod resconf;
pub mod resolver;
pub mod rr;
mod util;

pub use error::{Error, Result};
