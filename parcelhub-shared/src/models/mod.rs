/// Database models for ParcelHub
///
/// Each model owns one table and exposes its store operations as associated
/// functions taking a pool (single statements) or a connection (steps of a
/// larger transaction).
///
/// # Models
///
/// - `user`: Accounts, created on first sign-in, with an authorization role
/// - `parcel`: Parcels booked by users, unpaid until settled
/// - `payment`: Append-only payment ledger
/// - `rider`: Courier applications and their approval status

pub mod parcel;
pub mod payment;
pub mod rider;
pub mod user;
