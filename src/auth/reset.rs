use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(10);

/// A freshly minted password-reset token. `plain` goes to the user once,
/// only `hash` is stored.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub plain: String,
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate(now: OffsetDateTime) -> ResetToken {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let plain = hex::encode(raw);
    ResetToken {
        hash: hash_token(&plain),
        plain,
        expires_at: now + RESET_TOKEN_TTL,
    }
}

pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_random_and_hash_matches() {
        let now = OffsetDateTime::now_utc();
        let a = generate(now);
        let b = generate(now);
        assert_ne!(a.plain, b.plain);
        assert_eq!(a.plain.len(), 64);
        assert_eq!(a.hash, hash_token(&a.plain));
        assert_ne!(a.hash, a.plain);
        assert_eq!(a.expires_at - now, Duration::minutes(10));
    }

    #[test]
    fn any_changed_character_changes_the_hash() {
        let token = generate(OffsetDateTime::now_utc());
        let mut altered = token.plain.clone().into_bytes();
        altered[10] = if altered[10] == b'0' { b'1' } else { b'0' };
        let altered = String::from_utf8(altered).unwrap();
        assert_ne!(hash_token(&altered), token.hash);
    }
}
