//! Session authentication primitives.
//!
//! Provides the two stateless building blocks of the identity service:
//! - Password hashing (Argon2id, PHC strings with embedded parameters)
//! - Session token issuance, validation and refresh (HS256 JWT)
//!
//! Neither component holds per-user state. A token is valid purely by virtue of
//! its signature and its expiry, so rotating the signing secret invalidates every
//! token issued before the rotation.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify_stored("my_password", None));
//! ```
//!
//! ## Session Tokens
//! ```
//! use auth::{Identity, TokenService};
//!
//! let tokens = TokenService::new(b"secret_key_at_least_32_bytes_long!");
//! let identity = Identity::new("user123", "alice@example.com", "alice");
//!
//! let token = tokens.issue(identity).unwrap();
//! let claims = tokens.validate(&token).unwrap();
//! assert_eq!(claims.username(), "alice");
//!
//! let refreshed = tokens.refresh(&claims).unwrap();
//! assert!(tokens.validate(&refreshed).is_ok());
//! ```

pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use jwt::Claims;
pub use jwt::Identity;
pub use jwt::JwtError;
pub use jwt::TokenService;
pub use jwt::ValidatedClaims;
pub use jwt::SESSION_LIFETIME_HOURS;
pub use password::PasswordError;
pub use password::PasswordHasher;
