//! Incremental UTF-8 validation.
//!
//! The parser validates multibyte sequences byte-at-a-time so that it can
//! suspend between any two of them. A lead byte selects the sequence
//! length and the admissible range of the *first* continuation byte;
//! those per-class first ranges are what exclude overlong encodings,
//! surrogates, and code points past U+10FFFF. Every later continuation
//! byte is plain `80..=BF`.

pub(crate) const CONT_LO: u8 = 0x80;
pub(crate) const CONT_HI: u8 = 0xbf;

/// Classify a lead byte at or above 0x80: the count of continuation
/// bytes, and the admissible range of the first one. `None` marks an
/// illegal lead (bare continuations, C0/C1 overlongs, F5 and above).
pub(crate) fn classify(lead: u8) -> Option<(u8, u8, u8)> {
    match lead {
        0xc2..=0xdf => Some((1, CONT_LO, CONT_HI)),
        0xe0 => Some((2, 0xa0, CONT_HI)),
        0xe1..=0xec => Some((2, CONT_LO, CONT_HI)),
        0xed => Some((2, CONT_LO, 0x9f)),
        0xee..=0xef => Some((2, CONT_LO, CONT_HI)),
        0xf0 => Some((3, 0x90, CONT_HI)),
        0xf1..=0xf3 => Some((3, CONT_LO, CONT_HI)),
        0xf4 => Some((3, CONT_LO, 0x8f)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::{classify, CONT_HI, CONT_LO};

    // Validate a whole buffer with the incremental rules.
    fn accepts(bytes: &[u8]) -> bool {
        let mut it = bytes.iter().copied();
        while let Some(b) = it.next() {
            if b < 0x80 {
                continue;
            }
            let Some((n, mut lo, mut hi)) = classify(b) else {
                return false;
            };
            for _ in 0..n {
                match it.next() {
                    Some(c) if c >= lo && c <= hi => (),
                    _ => return false,
                }
                (lo, hi) = (CONT_LO, CONT_HI);
            }
        }
        true
    }

    #[test]
    fn test_agrees_with_std() {
        // Boundary continuation values around every interesting lead.
        let leads = 0x80..=0xff;
        let conts = [0x00, 0x7f, 0x80, 0x8f, 0x90, 0x9f, 0xa0, 0xbf, 0xc0, 0xff];

        for lead in leads {
            for &c1 in &conts {
                for &c2 in &conts {
                    for &c3 in &conts {
                        for probe in [
                            vec![lead],
                            vec![lead, c1],
                            vec![lead, c1, c2],
                            vec![lead, c1, c2, c3],
                        ] {
                            // Compare against std on exact-length
                            // sequences only; `accepts` reads through
                            // trailing bytes as new scalars.
                            let expect_len = match classify(lead) {
                                Some((n, _, _)) => 1 + n as usize,
                                None => 1,
                            };
                            if probe.len() == expect_len {
                                assert_eq!(
                                    accepts(&probe),
                                    std::str::from_utf8(&probe).is_ok(),
                                    "probe {probe:02x?}"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_known_sequences() {
        assert!(accepts("λ".as_bytes()));
        assert!(accepts("語".as_bytes()));
        assert!(accepts("𝄞".as_bytes()));
        assert!(accepts(&[0xf4, 0x8f, 0xbf, 0xbf])); // U+10FFFF.

        assert!(!accepts(&[0x80])); // Bare continuation.
        assert!(!accepts(&[0xc0, 0xaf])); // Overlong '/'.
        assert!(!accepts(&[0xe0, 0x9f, 0xbf])); // Overlong 3-byte.
        assert!(!accepts(&[0xed, 0xa0, 0x80])); // Surrogate D800.
        assert!(!accepts(&[0xf4, 0x90, 0x80, 0x80])); // Past U+10FFFF.
        assert!(!accepts(&[0xf5, 0x80, 0x80, 0x80])); // Illegal lead.
    }
}
