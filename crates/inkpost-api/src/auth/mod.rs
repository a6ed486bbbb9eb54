//! Authentication: JWT issuing, password hashing and the auth middleware.

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService};
pub use middleware::{jwt_auth, optional_jwt_auth, AuthUser, OptionalAuthUser};
