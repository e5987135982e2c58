pub mod claims;
pub mod errors;
pub mod handler;

pub use claims::Claims;
pub use claims::Identity;
pub use claims::ValidatedClaims;
pub use claims::SESSION_LIFETIME_HOURS;
pub use errors::JwtError;
pub use handler::TokenService;
