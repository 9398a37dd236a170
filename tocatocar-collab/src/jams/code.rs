use lazy_static::lazy_static;
use rand::{thread_rng, Rng};
use regex::Regex;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LENGTH: usize = 4;

lazy_static! {
    static ref CODE_REGEX: Regex = Regex::new(r"^[A-Z0-9]{4}$").unwrap();
}

/// Produces candidate jam codes
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

#[derive(Debug, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> String {
        let mut rng = thread_rng();

        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}

/// Uppercases a user supplied code, returning [None] if it can't be a jam code
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    CODE_REGEX.is_match(&code).then_some(code)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_random_codes_are_valid() {
        let codes = RandomCodes;

        for _ in 0..100 {
            let code = codes.next_code();
            assert_eq!(normalize_code(&code), Some(code));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" ab12 "), Some("AB12".to_string()));
        assert_eq!(normalize_code("AB1"), None);
        assert_eq!(normalize_code("AB-2"), None);
        assert_eq!(normalize_code("ÁB12"), None);
    }
}
