//! Core types and trait definitions for the Gatekeep access-control service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! access gate lives here; storage backends (e.g. `gatekeep-store-sqlite`)
//! implement the traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod alert;
pub mod credential;
pub mod error;
pub mod gate;
pub mod permission;
pub mod policy;
pub mod staff;
pub mod store;
pub mod visitor;

pub use error::{Error, Result};
