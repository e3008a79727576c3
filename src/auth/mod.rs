/// Authentication module
///
/// Handles JWT token issuance/validation, password hashing,
/// refresh token fingerprints and the authentication flows built on them.

mod claims;
mod jwt;
mod password;
pub mod refresh_token;
mod service;

pub use claims::{Claims, TokenKind};
pub use jwt::{TokenPair, TokenService};
pub use password::PasswordHasher;
pub use service::{AuthService, AuthSession, Registration};
