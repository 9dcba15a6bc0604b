//! OAuth2 Authorization Server module.
//!
//! ## Supported Flows
//!
//! - Authorization Code (with per-client consent)
//! - Resource Owner Password Credentials
//! - Refresh Token (rotated on every use)
//!
//! ## Endpoints
//!
//! - `POST /oauth2/token` - Token endpoint
//! - `POST /oauth2/revoke` - Token revocation
//! - `POST /oauth2/introspect` - Token introspection
//! - `GET|POST /oauth2/verify` - Bearer token verification
//!
//! The authorization endpoint needs an authenticated end-user session and is
//! exposed as [`AuthorizationFlow`] for the embedding application to drive.

pub mod authorize;
pub mod bearer;
pub mod codes;
pub mod consent;
pub mod endpoints;
pub mod grants;
pub mod introspection;
pub mod password;
pub mod registrar;
pub mod revocation;
mod state;
pub mod tokens;

pub use authorize::{AuthorizationFlow, AuthorizationOutcome, AuthorizeRequest};
pub use endpoints::router;
pub use grants::{GrantProcessor, GrantType, TokenEndpoint, TokenRequest, TokenResponse};
pub use introspection::{
    IntrospectionResult, IntrospectionService, JwtIntrospection, PlainIntrospection,
};
pub use password::{DbUserCredentials, UserCredentials, hash_password, verify_password};
pub use registrar::{ClientCredentials, ClientRegistry};
pub use state::OAuth2State;

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
