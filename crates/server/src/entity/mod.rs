//! SeaORM entities backing the authorization server.

pub mod oauth2_access_token;
pub mod oauth2_authorization;
pub mod oauth2_client;
pub mod oauth2_client_grant;
pub mod oauth2_public_key;
pub mod oauth2_refresh_token;
pub mod oauth2_user;
