/// Middleware module
///
/// Access control: the JWT guard (required and optional modes), the role
/// gate, and the extractors handlers use to read the resolved identity.

mod extract;
mod guard;
mod jwt_middleware;
mod role;

pub use extract::{Authenticated, MaybeAuthenticated};
pub use guard::{authenticate, require_role, AuthContext, GuardRejection};
pub use jwt_middleware::JwtMiddleware;
pub use role::RequireRole;
