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

//! Implementation of the nameserver hints table.
//!
//! The hints table maps zone names to nameserver addresses, each with
//! a configured priority and an adaptively adjusted *effective*
//! priority. Servers that time out are pushed into a penalty box
//! (effective priority zero) for a bounded number of seconds and are
//! reinstated lazily once the penalty expires, so one dead server
//! stops soaking up queries without being forgotten.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use arrayvec::ArrayVec;
use log::debug;

use crate::name::NameBuf;
use crate::resconf::ResolvConf;

/// The number of address slots per zone. Once a zone is full, further
/// insertions overwrite the oldest slot.
pub const MAX_SERVERS: usize = 16;

/// The longest penalty, in seconds, a failing server serves at once.
const MAX_PENALTY_SECS: u64 = 60;

////////////////////////////////////////////////////////////////////////
// MONOTONIC-ISH CLOCK                                                //
////////////////////////////////////////////////////////////////////////

/// Returns a tick count in seconds that advances only when the wall
/// clock advances. A wall clock stepped backward holds the tick
/// steady instead of rewinding it, so a clock reset cannot strand a
/// server in the penalty box; forward jumps are accepted verbatim.
///
/// The two cells race benignly under concurrent callers: the worst
/// case is a missed or double-counted second, which only shifts a
/// penalty expiry by that much.
fn monotonic_now() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    static TICK: AtomicU64 = AtomicU64::new(0);

    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let last = LAST.swap(wall, Ordering::Relaxed);
    if last != 0 && wall > last {
        TICK.fetch_add(wall - last, Ordering::Relaxed);
    }
    TICK.load(Ordering::Relaxed)
}

////////////////////////////////////////////////////////////////////////
// HINTS TABLE                                                        //
////////////////////////////////////////////////////////////////////////

/// One nameserver address within a zone's hint list.
///
/// `saved` is the configured priority, fixed at insertion.
/// `effective`, `penalty_ttl`, and `nlost` are the only fields mutated
/// after setup; they use relaxed atomics, and no cross-field
/// consistency is assumed: a reader may pair a zero effective
/// priority with a stale TTL, costing at most one extra probe of a
/// deprioritized server.
struct Server {
    addr: SocketAddr,
    saved: u32,
    effective: AtomicU32,
    penalty_ttl: AtomicU64,
    nlost: AtomicU32,
}

impl Server {
    fn new(addr: SocketAddr, priority: u32) -> Self {
        let priority = priority.max(1);
        Self {
            addr,
            saved: priority,
            effective: AtomicU32::new(priority),
            penalty_ttl: AtomicU64::new(0),
            nlost: AtomicU32::new(0),
        }
    }

    /// Returns the server to its configured priority.
    fn restore(&self) {
        self.effective.store(self.saved, Ordering::Relaxed);
        self.penalty_ttl.store(0, Ordering::Relaxed);
        self.nlost.store(0, Ordering::Relaxed);
    }

    /// Returns the server to its configured priority if its penalty
    /// has expired.
    fn restore_if_expired(&self, now: u64) {
        let ttl = self.penalty_ttl.load(Ordering::Relaxed);
        if ttl > 0 && ttl < now {
            self.restore();
            debug!("hints: {} restored to priority {}", self.addr, self.saved);
        }
    }
}

/// The hint list for one zone.
struct Zone {
    name: NameBuf,
    servers: ArrayVec<Server, MAX_SERVERS>,
}

/// A table of nameserver hints, keyed by zone name.
///
/// Zones and addresses are inserted during setup through `&mut self`;
/// afterwards the table is shared read-only and only the per-address
/// priority state changes. [`Hints::update`] feeds query outcomes
/// back into that state, and [`Hints::grep`] drives the candidate
/// iterator.
///
/// The clock used for penalty expiry defaults to a monotonic-ish
/// wall-clock tick; [`Hints::with_clock`] substitutes another source,
/// which tests use to step time by hand.
pub struct Hints {
    zones: Vec<Zone>,
    now: fn() -> u64,
}

impl Hints {
    /// Creates an empty table using the default clock.
    pub fn new() -> Self {
        Self::with_clock(monotonic_now)
    }

    /// Creates an empty table whose penalty expiry uses `now` as its
    /// clock.
    pub fn with_clock(now: fn() -> u64) -> Self {
        Self {
            zones: Vec::new(),
            now,
        }
    }

    /// Adds `addr` to `zone`'s hint list with the given priority
    /// (clamped to at least 1), creating the zone if needed. Zones
    /// match case-insensitively. A full zone overwrites its oldest
    /// slot instead of growing.
    pub fn insert(&mut self, zone: &NameBuf, addr: SocketAddr, priority: u32) {
        let index = match self.zones.iter().position(|z| z.name == *zone) {
            Some(index) => index,
            None => {
                self.zones.push(Zone {
                    name: zone.clone(),
                    servers: ArrayVec::new(),
                });
                self.zones.len() - 1
            }
        };

        let zone = &mut self.zones[index];
        let server = Server::new(addr, priority);
        if zone.servers.is_full() {
            let slot = zone.servers.len() % MAX_SERVERS;
            zone.servers[slot] = server;
        } else {
            zone.servers.push(server);
        }
    }

    /// Seeds the root zone `.` from a configuration's nameserver list,
    /// assigning priorities 1..n in configuration order. Returns the
    /// number of addresses inserted.
    pub fn insert_resconf(&mut self, resconf: &ResolvConf) -> usize {
        let root = NameBuf::root();
        for (n, addr) in resconf.nameservers.iter().enumerate() {
            self.insert(&root, *addr, n as u32 + 1);
        }
        resconf.nameservers.len()
    }

    /// Feeds a query outcome for `addr` under `zone` back into the
    /// table. A negative `nice` counts a loss and benches the server
    /// (effective priority zero) for `min(60, 3 * losses)` seconds; a
    /// positive `nice` clears its record immediately. Every other
    /// address in the zone is checked for an expired penalty while we
    /// are here. Unknown zones and addresses are ignored.
    pub fn update(&self, zone: &NameBuf, addr: SocketAddr, nice: i32) {
        let now = (self.now)();
        let zone = match self.fetch(zone) {
            Some(zone) => zone,
            None => return,
        };

        for server in &zone.servers {
            if server.addr == addr {
                if nice < 0 {
                    let nlost = server.nlost.fetch_add(1, Ordering::Relaxed) as u64 + 1;
                    let penalty = MAX_PENALTY_SECS.min(3 * nlost);
                    server.effective.store(0, Ordering::Relaxed);
                    server.penalty_ttl.store(now + penalty, Ordering::Relaxed);
                    debug!("hints: {} benched for {}s after {} losses", addr, penalty, nlost);
                } else if nice > 0 {
                    server.restore();
                }
            } else {
                server.restore_if_expired(now);
            }
        }
    }

    /// Fills `out` with candidate addresses for the zone named by
    /// `iter`, resuming wherever the previous call left off, and
    /// returns how many were written. `rng` supplies the randomness
    /// for rotating among equal-priority servers. An unknown zone
    /// yields zero candidates.
    pub fn grep(
        &self,
        out: &mut [SocketAddr],
        iter: &mut HintsIter,
        mut rng: impl FnMut() -> u32,
    ) -> usize {
        let zone = match self.fetch(&iter.zone) {
            Some(zone) => zone,
            None => return 0,
        };

        let mut n = 0;
        while n < out.len() {
            match self.ffwd(zone, iter, &mut rng) {
                Some(slot) => {
                    out[n] = zone.servers[slot].addr;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn fetch(&self, zone: &NameBuf) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == *zone)
    }

    /// Advances `iter` to its next slot: servers are visited in
    /// ascending effective priority, and within one priority band in
    /// a randomly rotated order. Entering a band rechecks every
    /// server's penalty expiry, so recovered servers rejoin at their
    /// configured priority before the band is chosen.
    fn ffwd(&self, zone: &Zone, iter: &mut HintsIter, rng: &mut impl FnMut() -> u32) -> Option<usize> {
        let count = zone.servers.len() as u32;
        if count == 0 {
            return None;
        }
        let now = (self.now)();

        loop {
            while iter.pos < iter.end {
                let slot = (iter.pos % count) as usize;
                iter.pos += 1;
                if zone.servers[slot].effective.load(Ordering::Relaxed) == iter.priority {
                    return Some(slot);
                }
            }

            // Find the smallest effective priority above the band we
            // just finished (or above zero on entry). Benched servers
            // sit at priority zero and are never selected.
            let floor = iter.priority + 1;
            let mut next = None;
            for server in &zone.servers {
                server.restore_if_expired(now);
                let priority = server.effective.load(Ordering::Relaxed);
                if priority >= floor && next.map_or(true, |n| priority < n) {
                    next = Some(priority);
                }
            }
            iter.priority = next?;
            iter.pos = rng() % count;
            iter.end = iter.pos + count;
        }
    }
}

impl Default for Hints {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hints {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut zones = f.debug_map();
        for zone in &self.zones {
            zones.entry(
                &zone.name,
                &zone.servers.iter().map(|s| s.addr).collect::<Vec<_>>(),
            );
        }
        zones.finish()
    }
}

////////////////////////////////////////////////////////////////////////
// HINTS ITERATION                                                    //
////////////////////////////////////////////////////////////////////////

/// The state of a restartable walk over one zone's hint list.
///
/// The cursor holds the zone name, the current priority band, and the
/// random walk and end positions within the band. It is plain data:
/// a driver can park it across I/O suspensions and resume with the
/// next [`Hints::grep`] call.
#[derive(Clone, Debug)]
pub struct HintsIter {
    zone: NameBuf,
    priority: u32,
    pos: u32,
    end: u32,
}

impl HintsIter {
    /// Returns a cursor over the hint list of `zone`.
    pub fn new(zone: NameBuf) -> Self {
        Self {
            zone,
            priority: 0,
            pos: 0,
            end: 0,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(n: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, n)), 53)
    }

    fn fixed_rng() -> impl FnMut() -> u32 {
        || 0
    }

    /// Collects one full iteration over the root zone.
    fn iterate(hints: &Hints, rng: impl FnMut() -> u32) -> Vec<SocketAddr> {
        let mut iter = HintsIter::new(NameBuf::root());
        let mut out = [addr(0); MAX_SERVERS];
        let n = hints.grep(&mut out, &mut iter, rng);
        out[..n].to_vec()
    }

    #[test]
    fn an_unknown_zone_yields_no_candidates() {
        let hints = Hints::new();
        assert!(iterate(&hints, fixed_rng()).is_empty());
    }

    #[test]
    fn iteration_is_ordered_by_priority() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        hints.insert(&root, addr(3), 3);
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 2);

        assert_eq!(iterate(&hints, fixed_rng()), [addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn priority_zero_is_clamped_to_one() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 0);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(1)]);
    }

    #[test]
    fn ties_rotate_with_the_random_source() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 1);

        let starting_with_first = iterate(&hints, || 0);
        let starting_with_second = iterate(&hints, || 1);
        assert_eq!(starting_with_first, [addr(1), addr(2)]);
        assert_eq!(starting_with_second, [addr(2), addr(1)]);
    }

    #[test]
    fn ordering_is_non_decreasing_in_effective_priority() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 1);
        hints.insert(&root, addr(3), 2);
        hints.insert(&root, addr(4), 3);

        for seed in 0..8 {
            let mut calls = 0u32;
            let order = iterate(&hints, || {
                calls += 1;
                seed + calls
            });
            assert_eq!(order.len(), 4);
            let priority_of = |a: &SocketAddr| match *a {
                a if a == addr(1) || a == addr(2) => 1,
                a if a == addr(3) => 2,
                _ => 3,
            };
            let priorities: Vec<u32> = order.iter().map(priority_of).collect();
            let mut sorted = priorities.clone();
            sorted.sort_unstable();
            assert_eq!(priorities, sorted);
        }
    }

    #[test]
    fn grep_resumes_across_batches() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 2);
        hints.insert(&root, addr(3), 3);

        let mut iter = HintsIter::new(NameBuf::root());
        let mut out = [addr(0); 1];
        let mut collected = Vec::new();
        loop {
            let n = hints.grep(&mut out, &mut iter, fixed_rng());
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&out[..n]);
        }
        assert_eq!(collected, [addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn zone_names_match_case_insensitively() {
        let mut hints = Hints::new();
        let zone: NameBuf = "Example.COM.".parse().unwrap();
        hints.insert(&zone, addr(1), 1);

        let mut iter = HintsIter::new("example.com.".parse().unwrap());
        let mut out = [addr(0); 4];
        assert_eq!(hints.grep(&mut out, &mut iter, fixed_rng()), 1);
        assert_eq!(out[0], addr(1));
    }

    #[test]
    fn a_full_zone_recycles_its_oldest_slot() {
        let mut hints = Hints::new();
        let root = NameBuf::root();
        for n in 0..(MAX_SERVERS as u8 + 1) {
            hints.insert(&root, addr(n + 1), 1);
        }
        let servers = iterate(&hints, fixed_rng());
        assert_eq!(servers.len(), MAX_SERVERS);
        // The 17th insertion displaced the 1st.
        assert!(servers.contains(&addr(MAX_SERVERS as u8 + 1)));
        assert!(!servers.contains(&addr(1)));
    }

    // Each clock-driven test owns its cell; the tests run in
    // parallel.
    mod clocks {
        use std::sync::atomic::{AtomicU64, Ordering};

        pub static BENCH: AtomicU64 = AtomicU64::new(0);
        pub fn bench() -> u64 {
            BENCH.load(Ordering::Relaxed)
        }

        pub static CAP: AtomicU64 = AtomicU64::new(0);
        pub fn cap() -> u64 {
            CAP.load(Ordering::Relaxed)
        }

        pub static SUCCESS: AtomicU64 = AtomicU64::new(0);
        pub fn success() -> u64 {
            SUCCESS.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn losses_bench_a_server_until_its_penalty_expires() {
        clocks::BENCH.store(100, Ordering::Relaxed);
        let mut hints = Hints::with_clock(clocks::bench);
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 2);

        // One loss: benched for min(60, 3 * 1) = 3 seconds.
        hints.update(&root, addr(1), -1);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(2)]);

        // Not yet expired (the penalty TTL must be strictly passed).
        clocks::BENCH.store(103, Ordering::Relaxed);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(2)]);

        // Expired: the server rejoins at its configured priority.
        clocks::BENCH.store(104, Ordering::Relaxed);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(1), addr(2)]);
    }

    #[test]
    fn repeated_losses_lengthen_the_penalty_up_to_the_cap() {
        clocks::CAP.store(1000, Ordering::Relaxed);
        let mut hints = Hints::with_clock(clocks::cap);
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);

        for _ in 0..30 {
            hints.update(&root, addr(1), -1);
        }
        // 30 losses would be 90 seconds, but the cap is 60.
        clocks::CAP.store(1060, Ordering::Relaxed);
        assert!(iterate(&hints, fixed_rng()).is_empty());
        clocks::CAP.store(1061, Ordering::Relaxed);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(1)]);
    }

    #[test]
    fn a_success_reinstates_a_benched_server_immediately() {
        clocks::SUCCESS.store(500, Ordering::Relaxed);
        let mut hints = Hints::with_clock(clocks::success);
        let root = NameBuf::root();
        hints.insert(&root, addr(1), 1);
        hints.insert(&root, addr(2), 2);

        hints.update(&root, addr(1), -1);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(2)]);
        hints.update(&root, addr(1), 1);
        assert_eq!(iterate(&hints, fixed_rng()), [addr(1), addr(2)]);
    }

    #[test]
    fn updates_for_unknown_zones_are_ignored() {
        let hints = Hints::new();
        hints.update(&NameBuf::root(), addr(1), -1);
    }
}
