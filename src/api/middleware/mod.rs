//! API middleware

mod cors;
mod identity;
mod logging;

pub use cors::cors_layer;
pub use identity::{IdentityAuth, IdentityClaims, MemberIdentity, IDENTITY_COOKIE};
pub use logging::log_request;
