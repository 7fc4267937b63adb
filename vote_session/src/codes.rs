use rand::Rng;

/// Source of access codes and opaque identifiers.
///
/// The generator is injected into [`crate::SessionManager`] so that tests
/// can substitute a deterministic sequence and exercise code collisions.
/// Uniqueness of opaque ids is a probabilistic property of the token space,
/// not an enforced invariant.
pub trait CodeGenerator {
    /// A 5-digit numeric string in 10000..=99999. Leading-zero-free by
    /// construction. Used for vote and results codes.
    fn access_code(&self) -> String;

    /// A 9-character token over lowercase letters and digits. Used for
    /// entry ids and voter ids.
    fn opaque_id(&self) -> String;
}

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 9;

/// Production generator backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn access_code(&self) -> String {
        rand::rng().random_range(10_000..=99_999u32).to_string()
    }

    fn opaque_id(&self) -> String {
        let mut rng = rand::rng();
        (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_codes_are_five_digits() {
        let gen = RandomCodes;
        for _ in 0..200 {
            let code = gen.access_code();
            assert_eq!(code.len(), 5, "code {} is not 5 characters", code);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'));
        }
    }

    #[test]
    fn opaque_ids_use_lowercase_alphanumerics() {
        let gen = RandomCodes;
        for _ in 0..200 {
            let id = gen.opaque_id();
            assert_eq!(id.len(), 9);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}
