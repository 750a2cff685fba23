//! Credential mechanism library
//!
//! Reusable, domain-free building blocks for credential handling:
//! - Password hashing (Argon2id) and temporary-password generation
//! - One-time verification/reset tokens (plain value + hashed storage form)
//! - Signed session token encoding and validation (HS256)
//!
//! The consuming service defines its own account semantics and claim types
//! and adapts these mechanisms behind its own ports; nothing here knows what
//! an account is.
//!
//! # Examples
//!
//! ## Password hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! ```
//!
//! ## One-time tokens
//! ```
//! use chrono::{Duration, Utc};
//!
//! let issued = auth::token::issue(Duration::hours(1));
//! // `issued.plain` goes into the emailed link; only the hash is stored.
//! assert!(auth::token::validate(
//!     &issued.plain,
//!     &issued.hashed,
//!     issued.expires_at,
//!     Utc::now(),
//! ));
//! ```
//!
//! ## Session tokens
//! ```
//! use auth::JwtCodec;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Claims { sub: String, exp: i64 }
//!
//! let codec = JwtCodec::new(b"secret_key_at_least_32_bytes_long!");
//! let claims = Claims { sub: "account-1".into(), exp: i64::MAX };
//! let token = codec.encode(&claims).unwrap();
//! let decoded: Claims = codec.decode(&token).unwrap();
//! ```

pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use jwt::JwtCodec;
pub use jwt::JwtError;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use token::IssuedToken;
