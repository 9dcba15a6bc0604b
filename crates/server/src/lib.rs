//! An OAuth2 authorization server core.
//!
//! Issues, rotates, revokes and introspects tokens for registered clients on
//! behalf of end users, backed by a SeaORM database.

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
