use rand::{Rng, rng};

const RUNES_ALPHA_NUMBER: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// math_rand_alpha_number generates a random alphabet and number sequence of
/// the requested length, used for stream and track identifiers.
pub(crate) fn math_rand_alpha_number(n: usize) -> String {
    let mut rng = rng();

    (0..n)
        .map(|_| {
            let idx = rng.random_range(0..RUNES_ALPHA_NUMBER.len());
            RUNES_ALPHA_NUMBER[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_math_rand_alpha_number() {
        let s = math_rand_alpha_number(16);
        assert_eq!(s.len(), 16);
        assert!(s.bytes().all(|b| RUNES_ALPHA_NUMBER.contains(&b)));
    }
}
