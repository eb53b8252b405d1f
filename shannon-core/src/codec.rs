//! Decoder for the scatter-load compression scheme.
//!
//! The format looks like the LZ77 variant the ARM linker emits for
//! compressed scatter regions: each record starts with a control byte
//! packing a literal count (low 2 bits, 0 escapes to a full byte) and a
//! back-reference length (high 4 bits, 0 escapes to a full byte), with
//! bits 2-3 selecting how far back the reference reaches.
//!
//! The decoder is intentionally lenient: firmware images are not always
//! well-formed, and a partially decoded buffer is still useful to the
//! analyst. Every boundary violation returns the output produced so far
//! instead of an error.

/// How far a single record can read past `cnt` before the loop condition
/// stops it: control byte + two escape bytes + 255 literals + offset +
/// extension byte. Callers that feed the decoder a window out of a larger
/// address space should extend it by this much.
pub const MAX_LOOKAHEAD: u32 = 0x110;

/// Decompress up to `cnt` input bytes from `input`, producing at most
/// `cnt` output bytes.
///
/// `input` may extend past `cnt`; a record that straddles the boundary
/// keeps reading from the window like the original load-time code reads
/// the live address space. Running off the end of the window, overrunning
/// the output cap, or a back-reference outside `[0, cnt]` all end the
/// decode with the bytes produced so far.
pub fn decompress(input: &[u8], cnt: usize) -> Vec<u8> {
    let mut src = 0usize;
    let mut out: Vec<u8> = Vec::new();

    let next_byte = |src: &mut usize| -> Option<u8> {
        let b = input.get(*src).copied();
        if b.is_some() {
            *src += 1;
        }
        b
    };

    while src < cnt {
        let Some(c) = next_byte(&mut src) else {
            return out;
        };

        // low 2 bits: literal run length, 0 escapes to a full count byte
        let mut literal_count = (c & 3) as usize;
        if literal_count == 0 {
            let Some(b) = next_byte(&mut src) else {
                return out;
            };
            literal_count = b as usize;
        }

        // high 4 bits: back-reference length code, 0 escapes likewise
        let mut back_len = (c >> 4) as usize;
        if back_len == 0 {
            let Some(b) = next_byte(&mut src) else {
                return out;
            };
            back_len = b as usize;
        }

        for _ in 0..literal_count {
            if out.len() >= cnt {
                return out;
            }
            let Some(b) = next_byte(&mut src) else {
                return out;
            };
            out.push(b);
        }

        if back_len != 0 {
            let Some(offset) = next_byte(&mut src) else {
                return out;
            };

            let bits23 = (c & 0xC) as i64;
            let mut back_src = out.len() as i64 - offset as i64;
            if bits23 == 0xC {
                // both bits set: a whole extra byte of distance, in pages of 256
                let Some(ext) = next_byte(&mut src) else {
                    return out;
                };
                back_src -= 256 * ext as i64;
            } else {
                back_src -= 64 * bits23;
            }

            // copy one byte at a time: the reference may overlap the bytes
            // this very loop appends (run-length repetition)
            for _ in 0..back_len + 1 {
                if out.len() >= cnt {
                    return out;
                }
                if back_src > cnt as i64 {
                    return out;
                }
                if back_src < 0 {
                    return out;
                }
                let b = out.get(back_src as usize).copied().unwrap_or(0);
                out.push(b);
                back_src += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn literal_only_stream() {
        // 3 literals, back-length escaped to 0
        let input = [0x03, 0x00, b'X', b'Y', b'Z'];
        assert_eq!(decompress(&input, input.len()), b"XYZ");
    }

    #[test]
    fn escaped_literal_count() {
        // control 0x00 escapes both fields: 4 literals, no back-reference
        let input = hex::decode("00040041424344").unwrap();
        assert_eq!(decompress(&input, input.len()), b"ABCD");
    }

    #[test]
    fn back_reference_repeats_earlier_output() {
        // 3 literals "ABC", then a 4-byte reference reaching 3 bytes back.
        // The output cap equals the input length (5), so only two of the
        // four reference bytes fit.
        let input = [0x33, b'A', b'B', b'C', 0x03];
        assert_eq!(decompress(&input, input.len()), b"ABCAB");
    }

    #[test]
    fn back_reference_with_larger_cap() {
        // same stream, cap high enough for the whole reference; the decode
        // then stops on window exhaustion with everything produced
        let input = [0x33, b'A', b'B', b'C', 0x03];
        assert_eq!(decompress(&input, 12), b"ABCABCA");
    }

    #[test]
    fn extended_distance_bytes() {
        // bits 2-3 set: distance gains an extra byte in 256-byte pages
        let input = [0x1D, b'A', 0x01, 0x00];
        assert_eq!(decompress(&input, input.len()), b"AAA");
    }

    #[test]
    fn overlapping_reference_is_run_length() {
        // 1 literal then a 9-byte reference at distance 1: classic RLE
        let input = [0x81, b'Q', 0x01];
        assert_eq!(decompress(&input, 16), b"QQQQQQQQQQ");
    }

    #[test]
    fn negative_back_reference_bails_out() {
        // offset 0xFF reaches far before the start of the output
        let input = [0x11, b'A', 0xFF];
        let out = decompress(&input, 8);
        assert_eq!(out, b"A");
        assert!(out.len() < 8);
    }

    #[test]
    fn destination_cap_mid_literal_run() {
        let input = [0x03, 0x00, b'X', b'Y', b'Z'];
        assert_eq!(decompress(&input, 2), b"XY");
    }

    #[test]
    fn output_never_exceeds_cnt() {
        let crafted: &[&[u8]] = &[
            &[0x33, b'A', b'B', b'C', 0x03],
            &[0x81, b'Q', 0x01, 0x81, b'R', 0x01],
            &[0x00, 0xFF, 0x00, 0x41],
            &[0xFF; 32],
            &[0x00; 32],
        ];
        for input in crafted {
            for cnt in [0, 1, 2, input.len(), input.len() * 2] {
                let out = decompress(input, cnt);
                assert!(out.len() <= cnt, "cnt={} produced {}", cnt, out.len());
            }
        }
    }

    #[test]
    fn empty_input() {
        assert_eq!(decompress(&[], 0), b"");
        assert_eq!(decompress(&[], 16), b"");
    }
}
