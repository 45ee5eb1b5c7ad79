// /server/src/secret.rs
use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};

const PASS_ITERATIONS: usize = 10;
const PASS_RAND_CYCLES: usize = 4;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!_@#$%^&+=";

/// Выводит одноразовый код подтверждения из email и серверной соли.
///
/// Код полностью детерминирован парой (email, соль): цепочка SHA-256
/// задает зерно генератора, из которого в фиксированном порядке
/// берется по символу из каждой группы за цикл. Это НЕ криптостойкий
/// пароль, только короткоживущий код для письма подтверждения.
pub fn create_secret_code(email: &str, salt: &str) -> String {
    let mut secret = format!("{email}{salt}");
    for _ in 0..PASS_ITERATIONS {
        secret = hex::encode(Sha256::digest(secret.as_bytes()));
    }

    let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
    let mut rng = StdRng::from_seed(seed);

    let mut code = String::with_capacity(PASS_RAND_CYCLES * 4);
    for _ in 0..PASS_RAND_CYCLES {
        for group in [LOWERCASE, UPPERCASE, DIGITS, SPECIAL] {
            code.push(group[rng.gen_range(0..group.len())] as char);
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_deterministic() {
        let a = create_secret_code("ivan@example.ru", "salt");
        let b = create_secret_code("ivan@example.ru", "salt");
        assert_eq!(a, b);
    }

    #[test]
    fn code_depends_on_email_and_salt() {
        let base = create_secret_code("ivan@example.ru", "salt");
        assert_ne!(base, create_secret_code("petr@example.ru", "salt"));
        assert_ne!(base, create_secret_code("ivan@example.ru", "other-salt"));
    }

    #[test]
    fn code_has_fixed_group_order() {
        let code = create_secret_code("ivan@example.ru", "salt");
        assert_eq!(code.len(), PASS_RAND_CYCLES * 4);
        for cycle in code.as_bytes().chunks(4) {
            assert!(cycle[0].is_ascii_lowercase());
            assert!(cycle[1].is_ascii_uppercase());
            assert!(cycle[2].is_ascii_digit());
            assert!(SPECIAL.contains(&cycle[3]));
        }
    }
}
