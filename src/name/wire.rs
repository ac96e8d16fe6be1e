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

//! Implementation of the on-the-wire domain name codec: encoding with
//! pointer compression, expansion, and skipping.
//!
//! Wire-format names are sequences of `(length, octets)` labels
//! terminated by a null label ([RFC 1035 § 3.1]). A label octet whose
//! top two bits are `11` is instead a compression pointer whose low 14
//! bits give the offset of a prior occurrence in the same message
//! ([RFC 1035 § 4.1.4]); the other two tag bit patterns are reserved.
//!
//! [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
//! [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4

use super::{NameBuf, MAX_LABEL_LEN, MAX_NAME_LEN};
use crate::error::{Error, Result};

/// The maximum number of compression pointers followed while expanding
/// a single name. Well-formed messages only point backward, so any
/// chain longer than this is cyclic or garbage.
pub(crate) const MAX_PTRS: usize = 127;

/// The largest message offset expressible in a compression pointer.
pub(crate) const POINTER_MAX: usize = 0x3fff;

////////////////////////////////////////////////////////////////////////
// SINGLE-LABEL EXPANSION                                             //
////////////////////////////////////////////////////////////////////////

/// Expands the single label at offset `src` of `data`, following any
/// compression pointers first. The label octets are copied into `buf`,
/// and the label length is returned together with the offset of the
/// octet after the label (in the chunk the label was found in, i.e.
/// after any pointers were followed). A null label yields length zero.
fn expand_label(buf: &mut [u8; MAX_LABEL_LEN], data: &[u8], mut src: usize) -> Result<(usize, usize)> {
    let end = data.len();
    let mut nptrs = 0;

    loop {
        if src >= end {
            return Err(Error::Malformed);
        }
        match data[src] >> 6 {
            0b00 => {
                let len = (data[src] & 0x3f) as usize;
                src += 1;
                if end - src < len {
                    return Err(Error::Malformed);
                }
                buf[..len].copy_from_slice(&data[src..src + len]);
                return Ok((len, src + len));
            }
            0b11 => {
                nptrs += 1;
                if nptrs > MAX_PTRS {
                    return Err(Error::PointerLoop);
                }
                if end - src < 2 {
                    return Err(Error::Malformed);
                }
                src = (((data[src] & 0x3f) as usize) << 8) | data[src + 1] as usize;
            }
            _ => return Err(Error::Malformed),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ENCODING WITH COMPRESSION                                          //
////////////////////////////////////////////////////////////////////////

/// Encodes the presentation-form name `src` into `dst` in wire format,
/// then tries to compress it against the message `prior` using the
/// offsets in `dict`. Returns the number of octets written.
///
/// The first pass converts dot-separated labels into `(length, octets)`
/// pairs and appends the null terminator. The second pass walks the
/// written labels from the front; for each suffix it scans the
/// dictionary in insertion order, lining the suffix up against every
/// label suffix of each dictionary name. The first pair of suffixes
/// that match label-for-label (ASCII-case-insensitively) down to their
/// null labels is replaced by a two-octet pointer, provided the target
/// offset fits in 14 bits. Dictionary entries at or beyond the end of
/// `prior` are ignored.
///
/// Fails with [`Error::TooLong`] when a label exceeds 63 octets or the
/// encoded name does not fit in `dst` (or in the 255-octet wire
/// limit).
pub(crate) fn compress(dst: &mut [u8], src: &[u8], prior: &[u8], dict: &[u16]) -> Result<usize> {
    let lim = dst.len().min(MAX_NAME_LEN);

    // First pass: uncompressed labels.
    let mut dp = 0; // position of the pending length octet
    let mut dx = 1; // next octet to write
    let mut sp = 0; // start of the current run in src
    let mut sx = 0;

    while sx < src.len() {
        if src[sx] == b'.' {
            let run = sx - sp;
            if run > MAX_LABEL_LEN {
                return Err(Error::TooLong);
            }
            if dp >= lim {
                return Err(Error::TooLong);
            }
            dst[dp] = run as u8;
            dp = dx;
            dx += 1;
            sx += 1;
            sp = sx;
        } else {
            if dx >= lim {
                return Err(Error::TooLong);
            }
            dst[dx] = src[sx];
            dx += 1;
            sx += 1;
        }
    }

    if sx > sp {
        // The name did not end with a dot; close the final run.
        let run = sx - sp;
        if run > MAX_LABEL_LEN {
            return Err(Error::TooLong);
        }
        if dp >= lim {
            return Err(Error::TooLong);
        }
        dst[dp] = run as u8;
        dp = dx;
    }

    if dp >= lim {
        return Err(Error::TooLong);
    }
    dst[dp] = 0;
    let wire_len = dp + 1;

    // Second pass: compression against the dictionary.
    let mut a_buf = [0u8; MAX_LABEL_LEN];
    let mut b_buf = [0u8; MAX_LABEL_LEN];
    let mut ap = 0;

    loop {
        let (a_len, a_next) = expand_label(&mut a_buf, &dst[..wire_len], ap)?;
        if a_len == 0 {
            break;
        }

        for &entry in dict {
            let entry = entry as usize;
            if entry >= prior.len() {
                // Stale entry left behind by a failed push.
                continue;
            }

            let mut bp = entry;
            loop {
                let (b_len, b_next) = match expand_label(&mut b_buf, prior, bp) {
                    Ok(label) => label,
                    Err(_) => break,
                };
                if b_len == 0 {
                    break;
                }

                // Compare the suffixes starting at ap and bp, label by
                // label, until one of them terminates or they diverge.
                let mut am = a_buf;
                let mut bm = b_buf;
                let (mut al, mut ay) = (a_len, a_next);
                let (mut bl, mut by) = (b_len, b_next);
                let matched = loop {
                    if al == 0 && bl == 0 {
                        break true;
                    }
                    if al == 0 || bl == 0 || !am[..al].eq_ignore_ascii_case(&bm[..bl]) {
                        break false;
                    }
                    let a = expand_label(&mut am, &dst[..wire_len], ay)?;
                    al = a.0;
                    ay = a.1;
                    let b = match expand_label(&mut bm, prior, by) {
                        Ok(label) => label,
                        Err(_) => break false,
                    };
                    bl = b.0;
                    by = b.1;
                };

                if matched && bp <= POINTER_MAX {
                    dst[ap] = 0xc0 | (bp >> 8) as u8;
                    dst[ap + 1] = (bp & 0xff) as u8;
                    return Ok(ap + 2);
                }

                bp = b_next;
            }
        }

        ap = a_next;
    }

    Ok(wire_len)
}

////////////////////////////////////////////////////////////////////////
// EXPANSION                                                          //
////////////////////////////////////////////////////////////////////////

/// Expands the wire-format name at offset `src` of `data` into `dst`
/// in presentation form, following compression pointers.
///
/// Returns the length of the presentation form, which may exceed
/// `dst.len()`; in that case the copy is truncated at the end of `dst`
/// but the walk continues so that the full length is still reported.
/// Every label is followed by a dot, so non-empty results are always
/// anchored; the bare root expands to `.`.
///
/// Fails with [`Error::Malformed`] on truncated data or reserved tag
/// bits, and with [`Error::PointerLoop`] once [`MAX_PTRS`] pointers
/// have been followed. The hop budget is not replenished by
/// intervening labels, so cycles that alternate labels and pointers
/// terminate as well.
pub(crate) fn expand(dst: &mut [u8], data: &[u8], mut src: usize) -> Result<usize> {
    let end = data.len();
    let mut dstp = 0;
    let mut nptrs = 0;

    while src < end {
        match data[src] >> 6 {
            0b00 => {
                let len = (data[src] & 0x3f) as usize;
                if len == 0 {
                    if dstp == 0 {
                        if !dst.is_empty() {
                            dst[0] = b'.';
                        }
                        dstp = 1;
                    }
                    return Ok(dstp);
                }

                src += 1;
                if end - src < len {
                    return Err(Error::Malformed);
                }
                if dstp < dst.len() {
                    let n = len.min(dst.len() - dstp);
                    dst[dstp..dstp + n].copy_from_slice(&data[src..src + n]);
                }
                src += len;
                dstp += len;

                if dstp < dst.len() {
                    dst[dstp] = b'.';
                }
                dstp += 1;
            }
            0b11 => {
                nptrs += 1;
                if nptrs > MAX_PTRS {
                    return Err(Error::PointerLoop);
                }
                if end - src < 2 {
                    return Err(Error::Malformed);
                }
                src = (((data[src] & 0x3f) as usize) << 8) | data[src + 1] as usize;
            }
            _ => return Err(Error::Malformed),
        }
    }

    Err(Error::Malformed)
}

/// Expands the name at offset `src` of `data` into a fresh [`NameBuf`].
pub(crate) fn expand_name(data: &[u8], src: usize) -> Result<NameBuf> {
    let mut buf = [0u8; MAX_NAME_LEN];
    let len = expand(&mut buf, data, src)?;
    if len > MAX_NAME_LEN {
        return Err(Error::TooLong);
    }
    NameBuf::try_from(&buf[..len])
}

////////////////////////////////////////////////////////////////////////
// SKIPPING                                                           //
////////////////////////////////////////////////////////////////////////

/// Advances past the wire-format name at offset `src` of `data`
/// without copying anything, returning the offset of the first octet
/// after it. A compression pointer ends the name: the two pointer
/// octets are consumed and the target is not followed.
pub(crate) fn skip(data: &[u8], mut src: usize) -> Result<usize> {
    let end = data.len();

    while src < end {
        match data[src] >> 6 {
            0b00 => {
                let len = (data[src] & 0x3f) as usize;
                src += 1;
                if len == 0 {
                    return Ok(src);
                } else if end - src > len {
                    src += len;
                } else {
                    // A data label cannot run to the end of the
                    // message; the null label must still follow.
                    return Err(Error::Malformed);
                }
            }
            0b11 => {
                return if end - src < 2 {
                    Err(Error::Malformed)
                } else {
                    Ok(src + 2)
                };
            }
            _ => return Err(Error::Malformed),
        }
    }

    Err(Error::Malformed)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const NO_DICT: &[u16] = &[];

    #[test]
    fn compress_encodes_plain_labels() {
        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"www.example.com.", &[], NO_DICT).unwrap();
        assert_eq!(&dst[..len], b"\x03www\x07example\x03com\x00");
    }

    #[test]
    fn compress_accepts_unanchored_names() {
        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"www.example.com", &[], NO_DICT).unwrap();
        assert_eq!(&dst[..len], b"\x03www\x07example\x03com\x00");
    }

    #[test]
    fn compress_of_empty_name_is_the_root() {
        let mut dst = [0u8; 4];
        let len = compress(&mut dst, b"", &[], NO_DICT).unwrap();
        assert_eq!(&dst[..len], b"\x00");
    }

    #[test]
    fn compress_points_into_the_dictionary() {
        // A message whose question name www.example.com. starts at
        // offset 12.
        let mut prior = vec![0u8; 12];
        prior.extend_from_slice(b"\x03www\x07example\x03com\x00");
        let dict = [12u16];

        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"example.com.", &prior, &dict).unwrap();
        assert_eq!(&dst[..len], b"\xc0\x10");
    }

    #[test]
    fn compress_replaces_partial_suffixes() {
        let mut prior = vec![0u8; 12];
        prior.extend_from_slice(b"\x07example\x03com\x00");
        let dict = [12u16];

        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"www.example.com.", &prior, &dict).unwrap();
        assert_eq!(&dst[..len], b"\x03www\xc0\x0c");
    }

    #[test]
    fn compress_matches_case_insensitively() {
        let mut prior = vec![0u8; 12];
        prior.extend_from_slice(b"\x07EXAMPLE\x03CoM\x00");
        let dict = [12u16];

        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"example.com.", &prior, &dict).unwrap();
        assert_eq!(&dst[..len], b"\xc0\x0c");
    }

    #[test]
    fn compress_scans_the_dictionary_in_insertion_order() {
        // Both entries hold example.com.; the first one wins.
        let mut prior = vec![0u8; 12];
        prior.extend_from_slice(b"\x07example\x03com\x00");
        prior.extend_from_slice(b"\x07example\x03com\x00");
        let dict = [12u16, 25u16];

        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"example.com.", &prior, &dict).unwrap();
        assert_eq!(&dst[..len], b"\xc0\x0c");
    }

    #[test]
    fn compress_ignores_stale_dictionary_entries() {
        // The entry points past the end of the message, as happens
        // when a push fails after registering its name.
        let prior = vec![0u8; 12];
        let dict = [12u16];

        let mut dst = [0u8; 64];
        let len = compress(&mut dst, b"example.com.", &prior, &dict).unwrap();
        assert_eq!(&dst[..len], b"\x07example\x03com\x00");
    }

    #[test]
    fn compress_rejects_long_labels() {
        let mut dst = [0u8; 128];
        let src = [b'x'; MAX_LABEL_LEN + 1];
        assert_eq!(compress(&mut dst, &src, &[], NO_DICT), Err(Error::TooLong));
    }

    #[test]
    fn compress_rejects_small_destinations() {
        let mut dst = [0u8; 8];
        assert_eq!(
            compress(&mut dst, b"www.example.com.", &[], NO_DICT),
            Err(Error::TooLong),
        );
    }

    #[test]
    fn expand_round_trips_compressed_names() {
        let mut wire = [0u8; 64];
        let wire_len = compress(&mut wire, b"WwW.Example.COM", &[], NO_DICT).unwrap();

        let mut dst = [0u8; 64];
        let len = expand(&mut dst, &wire[..wire_len], 0).unwrap();
        assert_eq!(&dst[..len], b"WwW.Example.COM.");
    }

    #[test]
    fn expand_follows_pointers() {
        let data = b"junk\x04test\x00junk\x07example\xc0\x04";
        let mut dst = [0u8; 64];
        let len = expand(&mut dst, data, 14).unwrap();
        assert_eq!(&dst[..len], b"example.test.");
    }

    #[test]
    fn expand_of_the_root_is_a_single_dot() {
        let mut dst = [0u8; 4];
        assert_eq!(expand(&mut dst, b"\x00", 0), Ok(1));
        assert_eq!(dst[0], b'.');
    }

    #[test]
    fn expand_reports_the_full_length_when_truncating() {
        let data = b"\x03www\x07example\x03com\x00";
        let mut dst = [0u8; 4];
        assert_eq!(expand(&mut dst, data, 0), Ok(16));
        assert_eq!(&dst, b"www.");
    }

    #[test]
    fn expand_rejects_reserved_tag_bits() {
        let mut dst = [0u8; 16];
        assert_eq!(expand(&mut dst, b"\x40x\x00", 0), Err(Error::Malformed));
        assert_eq!(expand(&mut dst, b"\x80x\x00", 0), Err(Error::Malformed));
    }

    #[test]
    fn expand_rejects_truncated_names() {
        let mut dst = [0u8; 16];
        assert_eq!(expand(&mut dst, b"\x07examp", 0), Err(Error::Malformed));
        assert_eq!(expand(&mut dst, b"\x03www", 0), Err(Error::Malformed));
        assert_eq!(expand(&mut dst, b"\x03www\xc0", 0), Err(Error::Malformed));
    }

    #[test]
    fn expand_rejects_self_referential_pointers() {
        // The pointer at offset 12 targets offset 12.
        let mut data = vec![0u8; 12];
        data.extend_from_slice(b"\xc0\x0c");
        let mut dst = [0u8; 16];
        assert_eq!(expand(&mut dst, &data, 12), Err(Error::PointerLoop));
    }

    #[test]
    fn expand_rejects_label_and_pointer_cycles() {
        // A one-label name that points back at itself. The hop budget
        // is a hard cap, so the interleaved label does not keep the
        // walk alive.
        let mut data = vec![0u8; 12];
        data.extend_from_slice(b"\x01a\xc0\x0c");
        let mut dst = [0u8; 300];
        assert_eq!(expand(&mut dst, &data, 12), Err(Error::PointerLoop));
    }

    #[test]
    fn expand_name_builds_a_namebuf() {
        let data = b"\x07example\x04test\x00";
        let name = expand_name(data, 0).unwrap();
        assert_eq!(name, "example.test.");
    }

    #[test]
    fn skip_passes_over_uncompressed_names() {
        assert_eq!(skip(b"\x07example\x04test\x00junk", 0), Ok(14));
    }

    #[test]
    fn skip_stops_after_a_pointer() {
        assert_eq!(skip(b"\x07example\xc0\x0cjunk", 0), Ok(10));
        assert_eq!(skip(b"\xc0\x0cjunk", 0), Ok(2));
    }

    #[test]
    fn skip_rejects_truncated_names() {
        assert_eq!(skip(b"\x07examp", 0), Err(Error::Malformed));
        assert_eq!(skip(b"\x04test", 0), Err(Error::Malformed));
        assert_eq!(skip(b"\xc0", 0), Err(Error::Malformed));
    }

    #[test]
    fn skip_rejects_reserved_tag_bits() {
        assert_eq!(skip(b"\x40x\x00", 0), Err(Error::Malformed));
        assert_eq!(skip(b"\x80x\x00", 0), Err(Error::Malformed));
    }
}
