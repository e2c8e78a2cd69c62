//! Bearer-token verification. Tokens are issued elsewhere; this service only
//! reads the owner id out of them.

pub mod claims;
pub mod jwt;

pub use jwt::{AuthUser, JwtKeys};
