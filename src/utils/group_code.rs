use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SEGMENT_LEN: usize = 4;

/// Draw a shareable group code in the form `XXXX-XXXX` (uppercase A-Z).
///
/// Uniqueness is not guaranteed here: the caller inserts under the
/// unique constraint on `booking.group_code` and redraws on collision.
pub fn generate() -> String {
    format!("{}-{}", segment(), segment())
}

fn segment() -> String {
    let mut rng = rand::thread_rng();
    (0..SEGMENT_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Validate the `^[A-Z]{4}-[A-Z]{4}$` shape of a caller-supplied code.
pub fn is_valid(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 2 * SEGMENT_LEN + 1 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| {
        if i == SEGMENT_LEN {
            *b == b'-'
        } else {
            b.is_ascii_uppercase()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_match_format() {
        for _ in 0..1000 {
            let code = generate();
            assert_eq!(code.len(), 9);
            assert!(is_valid(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn consecutive_draws_differ() {
        // 26^8 combinations; two equal consecutive draws would point at a
        // broken RNG rather than bad luck.
        assert_ne!(generate(), generate());
    }

    #[test]
    fn validation_rejects_malformed_codes() {
        assert!(is_valid("ABCD-EFGH"));
        assert!(!is_valid("abcd-efgh"));
        assert!(!is_valid("ABCD_EFGH"));
        assert!(!is_valid("ABCDEFGH"));
        assert!(!is_valid("ABC-DEFGH"));
        assert!(!is_valid("AB1D-EFGH"));
        assert!(!is_valid(""));
        assert!(!is_valid("ABCD-EFGH-IJKL"));
    }
}
