pub mod authn;
pub mod authz;
pub mod envelope;
pub mod gateway_trust;
pub mod idempotency;
pub mod ip_allow;
pub mod observe;
pub mod rate_limit;

pub use authn::{AdminAuthenticated, Authenticated};
