//! Short page identifier generation.
//!
//! Page ids are fixed-length strings drawn from a restricted alphabet:
//! digits and lowercase letters with the ambiguous glyphs `0 1 i l o`
//! removed. At 8 symbols over 31 characters the space holds roughly
//! 8.5 × 10^11 identifiers, which keeps expected collisions negligible for
//! the anticipated record volume; the database unique constraint remains
//! the authoritative guard, with the caller retrying a bounded number of
//! times on conflict.
//!
//! Candidates are drawn from the operating system's CSPRNG and screened
//! against a substring denylist before any uniqueness check is made.

use rand::rngs::OsRng;
use rand::Rng;

/// Length of every page identifier.
pub const PAGE_ID_LEN: usize = 8;

/// Allowed symbols. 31 characters: `2-9` plus lowercase minus `i l o`.
pub const PAGE_ID_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Substrings that must never appear in a published identifier.
const DENYLIST: &[&str] = &[
    "ass", "cum", "fag", "fck", "fuk", "jew", "kkk", "nga", "sex", "tit", "xxx",
];

/// Draw one candidate identifier from the OS CSPRNG.
///
/// The candidate has the right length and alphabet but has not been
/// screened; callers should pair this with [`is_clean`].
pub fn draw_candidate() -> String {
    let mut rng = OsRng;
    (0..PAGE_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PAGE_ID_ALPHABET.len());
            PAGE_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Whether a candidate passes the denylist screen.
pub fn is_clean(candidate: &str) -> bool {
    !DENYLIST.iter().any(|bad| candidate.contains(bad))
}

/// Whether a string has the shape of a page id (length and alphabet).
///
/// Used to reject obviously malformed lookups before touching storage.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == PAGE_ID_LEN
        && candidate.bytes().all(|b| PAGE_ID_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_shape() {
        for _ in 0..100 {
            let id = draw_candidate();
            assert_eq!(id.len(), PAGE_ID_LEN);
            assert!(id.bytes().all(|b| PAGE_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_candidates_vary() {
        let a = draw_candidate();
        let b = draw_candidate();
        // 31^8 possibilities; a repeat here would indicate a broken RNG.
        assert_ne!(a, b);
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_glyphs() {
        for bad in [b'0', b'1', b'i', b'l', b'o'] {
            assert!(!PAGE_ID_ALPHABET.contains(&bad));
        }
    }

    #[test]
    fn test_denylist_screen() {
        assert!(!is_clean("sexab2cd"));
        assert!(!is_clean("ab2kkkcd"));
        assert!(is_clean("abcd2345"));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("abcd2345"));
        assert!(!is_well_formed("abcd234")); // too short
        assert!(!is_well_formed("abcd23450")); // too long, contains 0
        assert!(!is_well_formed("ABCD2345")); // uppercase
    }
}
