//! HTTP handlers. Each module owns one console or gateway surface;
//! dispatch/quota/metering plumbing lives in `services`/`middleware` and
//! is invoked from here rather than duplicated.

pub mod admin;
pub mod auth;
pub mod health;
pub mod keys;
pub mod kyc;
pub mod oauth;
pub mod orgs;
pub mod token;

use serde::Serialize;

/// Thin `{ "data": ... }` envelope every success response shares, to
/// keep the shape distinct from [`crate::error::ErrorEnvelope`].
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
