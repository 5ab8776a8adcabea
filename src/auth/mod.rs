pub mod csrf;
pub mod token;

pub use token::{AuthUser, Claims, JwtConfig, SESSION_COOKIE};
