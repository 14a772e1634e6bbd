use rand::Rng;

/// Redemption code alphabet: A-Z and 2-9 without the look-alikes I, O, 0, 1.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_SYMBOLS: usize = 16;
const CODE_GROUP: usize = 4;

const APP_KEY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const APP_KEY_LEN: usize = 32;

fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// A `XXXX-XXXX-XXXX-XXXX` code. Uniqueness is left to the database.
pub fn generate_redemption_code() -> String {
    let raw = random_string(CODE_ALPHABET, CODE_SYMBOLS);
    let mut code = String::with_capacity(CODE_SYMBOLS + CODE_SYMBOLS / CODE_GROUP - 1);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && i % CODE_GROUP == 0 {
            code.push('-');
        }
        code.push(c);
    }
    code
}

/// `ak_` followed by 32 alphanumerics.
pub fn generate_app_key() -> String {
    format!("ak_{}", random_string(APP_KEY_ALPHABET, APP_KEY_LEN))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use regex::Regex;

    use super::*;
    use crate::validation::is_valid_app_key;

    fn code_shape() -> Regex {
        Regex::new(r"^[A-Z2-9]{4}-[A-Z2-9]{4}-[A-Z2-9]{4}-[A-Z2-9]{4}$").unwrap()
    }

    #[test]
    fn code_has_four_groups_of_four() {
        let code = generate_redemption_code();
        assert_eq!(code.len(), 19);
        assert!(code_shape().is_match(&code), "{code}");
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let codes: HashSet<_> = (0..500).map(|_| generate_redemption_code()).collect();
        assert_eq!(codes.len(), 500);
    }

    #[test]
    fn app_key_matches_validator() {
        for _ in 0..50 {
            let key = generate_app_key();
            assert_eq!(key.len(), 35);
            assert!(is_valid_app_key(&key), "{key}");
        }
    }

    proptest! {
        // The closure input only drives repetition; every case draws a fresh code.
        #[test]
        fn every_code_uses_only_the_unambiguous_alphabet(_seed in any::<u64>()) {
            let code = generate_redemption_code();
            prop_assert!(code_shape().is_match(&code));
            prop_assert!(!code.contains(['I', 'O', '0', '1']));
            prop_assert!(code
                .chars()
                .filter(|c| *c != '-')
                .all(|c| CODE_ALPHABET.contains(&(c as u8))));
        }
    }
}
