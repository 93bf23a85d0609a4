/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Identity verification of bearer tokens
/// - Admin role checks

pub mod auth;
