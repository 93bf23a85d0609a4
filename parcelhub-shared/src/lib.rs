//! # ParcelHub Shared Library
//!
//! Domain types, store operations and business workflows for the ParcelHub
//! delivery marketplace. The API server depends on this crate for everything
//! that is not HTTP plumbing.
//!
//! ## Module Organization
//!
//! - `models`: Users, parcels, payments and riders with their store operations
//! - `settlement`: Payment reconciliation (parcel settlement + ledger entry)
//! - `lifecycle`: Rider approval state machine and role promotion
//! - `auth`: Identity verification and authorization checks
//! - `gateway`: Payment gateway client (charge intents)
//! - `db`: Connection pool, migrations, timeouts and read retries

pub mod auth;
pub mod db;
pub mod gateway;
pub mod lifecycle;
pub mod models;
pub mod settlement;

/// Current version of the ParcelHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
