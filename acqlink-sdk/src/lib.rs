//! Wire types, signature codec and HTTP client for the acquiring gateway.
//!
//! The client lives behind the `client` cargo feature so crates that only
//! need the shared types and the signature codec do not pull in `reqwest`.

pub mod config;
pub mod objects;
pub mod signature;

#[cfg(feature = "client")]
pub mod client;
