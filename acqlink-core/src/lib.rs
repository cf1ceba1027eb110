#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod entities;
pub mod events;
pub mod framework;
pub mod payments;
pub mod processors;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
