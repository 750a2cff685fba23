use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

/// Entropy behind each plain token.
pub const TOKEN_BYTES: usize = 32;

/// A freshly issued one-time token.
///
/// `plain` is handed to the account holder exactly once (embedded in an
/// emailed link) and never persisted. `hashed` and `expires_at` are the
/// storage representation; possession of the plain value is the only way to
/// produce the stored hash again.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plain: String,
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a one-time token valid for `ttl` from now.
///
/// The plain form is 32 CSPRNG bytes, base64-url encoded so it survives a
/// query string untouched. Pure function of the entropy source and clock; no
/// side effects. The same generator serves email verification and password
/// reset - callers keep the instances apart.
pub fn issue(ttl: Duration) -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let plain = URL_SAFE_NO_PAD.encode(bytes);
    let hashed = hash(&plain);

    IssuedToken {
        plain,
        hashed,
        expires_at: Utc::now() + ttl,
    }
}

/// SHA-256 of a plain token, hex encoded, for storage and lookup.
pub fn hash(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a presented plain token against its stored representation.
///
/// Succeeds only when the recomputed hash matches `stored_hash` AND `now` is
/// strictly before `expires_at`. An expired token never validates, hash match
/// or not. On success the caller must clear both stored fields in the same
/// write so the token cannot replay.
pub fn validate(
    presented: &str,
    stored_hash: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    now < expires_at && hash(presented) == stored_hash
}
