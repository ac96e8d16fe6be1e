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

//! Implementation of the search-list candidate generator.

use super::ResolvConf;
use crate::name::NameBuf;

////////////////////////////////////////////////////////////////////////
// SEARCH STATE                                                       //
////////////////////////////////////////////////////////////////////////

/// The state token threaded through successive [`search`] calls.
///
/// The token is a plain 64-bit value so a driver can park it across
/// I/O suspensions; it packs the generator's phase, the index of the
/// next search suffix, and the query's precomputed dot count. The
/// initial state is the default (zero) value, and callers must not
/// fabricate or modify tokens between calls.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SearchState(u64);

////////////////////////////////////////////////////////////////////////
// CANDIDATE GENERATION                                               //
////////////////////////////////////////////////////////////////////////

/// Produces the next fully-qualified candidate for the query name
/// `qname` under `resconf`'s search policy, or `None` when the
/// candidates are exhausted.
///
/// The generator runs in three phases:
///
/// 1. On entry the dots in `qname` are counted. A name with at least
///    `options.ndots` dots is probably already qualified, so it is
///    emitted first, anchored, before the search list is consulted.
/// 2. Each search suffix in turn is appended to the anchored query
///    name and the combination is emitted.
/// 3. A name that fell below the `ndots` threshold is finally emitted
///    bare (anchored), as the last resort.
///
/// Candidates that would exceed the presentation-form length limit are
/// truncated at the buffer capacity.
///
/// ```
/// use respite::resconf::{search, ResolvConf, SearchState};
///
/// let mut conf = ResolvConf::default();
/// conf.search.push("example.com.".parse().unwrap());
///
/// let mut state = SearchState::default();
/// let mut candidates = Vec::new();
/// while let Some(name) = search(b"host", &conf, &mut state) {
///     candidates.push(name.to_string());
/// }
/// assert_eq!(candidates, ["host.example.com.", "host."]);
/// ```
pub fn search(qname: &[u8], resconf: &ResolvConf, state: &mut SearchState) -> Option<NameBuf> {
    let mut phase = state.0 & 0xff;
    let mut srchi = ((state.0 >> 8) & 0xff) as usize;
    let mut ndots = (state.0 >> 16) & 0xff;
    let mut candidate = None;

    loop {
        match phase {
            0 => {
                ndots = qname.iter().filter(|&&octet| octet == b'.').count().min(255) as u64;
                phase = 1;
                if ndots >= resconf.options.ndots as u64 {
                    candidate = Some(anchored_candidate(qname));
                    break;
                }
            }
            1 => {
                if srchi < resconf.search.len() {
                    let mut name = anchored_candidate(qname);
                    name.extend_truncated(resconf.search[srchi].as_bytes());
                    srchi += 1;
                    candidate = Some(name);
                    break;
                }
                phase = 2;
            }
            2 => {
                phase = 3;
                if ndots < resconf.options.ndots as u64 {
                    candidate = Some(anchored_candidate(qname));
                }
                break;
            }
            _ => break,
        }
    }

    state.0 = phase | ((srchi as u64) << 8) | (ndots << 16);
    candidate
}

/// Copies `qname` into a fresh buffer and anchors it, truncating at
/// capacity.
fn anchored_candidate(qname: &[u8]) -> NameBuf {
    let mut name = NameBuf::new();
    name.extend_truncated(qname);
    let _ = name.anchor();
    name
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
