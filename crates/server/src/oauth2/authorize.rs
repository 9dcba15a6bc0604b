//! Authorization code flow, from request validation to the redirect back to
//! the client.
//!
//! The caller authenticates the end user and decides whether consent was
//! given; this module only validates the request, issues codes and builds the
//! redirect target.

use crate::entity::oauth2_client;
use crate::error::{ErrorKind, OAuth2Error, OAuth2Result, ProtocolError};
use crate::oauth2::codes::CodeStore;
use crate::oauth2::consent::ConsentStore;
use crate::oauth2::registrar::{ClientRegistry, non_empty};
use serde::Deserialize;
use utoipa::ToSchema;

/// Query parameters of an authorization request.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// Must be "code"
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    /// Falls back to the registered URI when absent. Whatever is presented
    /// here must be presented again when the code is redeemed.
    pub redirect_uri: Option<String>,
    /// Opaque CSRF value, returned unchanged
    pub state: Option<String>,
    pub scope: Option<String>,
}

/// Where the user agent goes next.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthorizationOutcome {
    /// Redirect to the client, carrying either a code or an error.
    Redirect(String),
    /// No trustworthy redirect target exists; answer the user agent directly.
    Rejected(ProtocolError),
}

impl AuthorizationOutcome {
    pub fn location(&self) -> Option<&str> {
        match self {
            AuthorizationOutcome::Redirect(location) => Some(location),
            AuthorizationOutcome::Rejected(_) => None,
        }
    }
}

/// A request that passed the client and redirect URI checks.
struct Verified<'a> {
    client: oauth2_client::Model,
    /// Redirect target: the presented URI, or the registered one
    redirect_uri: String,
    /// URI as presented, empty when omitted; stored with the code
    presented_uri: &'a str,
    state: Option<&'a str>,
}

enum Validation<'a> {
    Valid(Verified<'a>),
    /// Failure reported through a redirect to the verified URI.
    Redirect(Verified<'a>, ProtocolError),
    /// Failure before a redirect target could be trusted.
    Reject(ProtocolError),
}

#[derive(Clone)]
pub struct AuthorizationFlow {
    clients: ClientRegistry,
    codes: CodeStore,
    consent: ConsentStore,
}

impl AuthorizationFlow {
    pub fn new(clients: ClientRegistry, codes: CodeStore, consent: ConsentStore) -> Self {
        Self {
            clients,
            codes,
            consent,
        }
    }

    /// Whether the request is well formed. Consent is not considered.
    #[tracing::instrument(skip_all, fields(client_id = ?request.client_id))]
    pub async fn validate(&self, request: &AuthorizeRequest) -> OAuth2Result<bool> {
        Ok(matches!(self.check(request).await?, Validation::Valid(_)))
    }

    /// Produce the outcome of an authorization request for `user_id`.
    ///
    /// Consent is not recorded here; see [`AuthorizationFlow::submit_decision`].
    #[tracing::instrument(skip_all, fields(client_id = ?request.client_id, user_id = %user_id))]
    pub async fn handle(
        &self,
        request: &AuthorizeRequest,
        user_id: &str,
        is_authorized: bool,
    ) -> OAuth2Result<AuthorizationOutcome> {
        let verified = match self.check(request).await? {
            Validation::Valid(verified) => verified,
            Validation::Redirect(verified, error) => {
                tracing::info!(error = %error.error, "Authorization request rejected");
                return Ok(AuthorizationOutcome::Redirect(error_redirect(&verified, &error)));
            }
            Validation::Reject(error) => {
                tracing::info!(error = %error.error, "Authorization request rejected");
                return Ok(AuthorizationOutcome::Rejected(error));
            }
        };

        if !is_authorized {
            let denied = ProtocolError::new(
                ErrorKind::AccessDenied,
                "The user denied access to your application",
            );
            return Ok(AuthorizationOutcome::Redirect(error_redirect(&verified, &denied)));
        }

        let code = self
            .codes
            .issue(
                &verified.client.id,
                user_id,
                verified.presented_uri,
                non_empty(request.scope.as_deref()),
            )
            .await?;

        let mut params = vec![("code", code.code.as_str())];
        if let Some(state) = verified.state {
            params.push(("state", state));
        }
        Ok(AuthorizationOutcome::Redirect(redirect_with(
            &verified.redirect_uri,
            &params,
        )))
    }

    /// Whether the consent page must be shown before `handle`.
    pub async fn requires_consent(&self, user_id: &str, client_id: &str) -> OAuth2Result<bool> {
        Ok(!self.consent.is_granted_client(user_id, client_id).await?)
    }

    /// Record the user's answer on the consent page, then finish the request.
    ///
    /// Refusal withdraws any earlier consent, which also revokes the pair's
    /// codes and tokens. Nothing is recorded for an invalid request.
    #[tracing::instrument(
        skip_all,
        fields(client_id = ?request.client_id, user_id = %user_id, agree = agree)
    )]
    pub async fn submit_decision(
        &self,
        request: &AuthorizeRequest,
        user_id: &str,
        agree: bool,
    ) -> OAuth2Result<AuthorizationOutcome> {
        if let Validation::Valid(verified) = self.check(request).await? {
            if agree {
                self.consent.grant(user_id, &verified.client.id).await?;
            } else {
                self.consent.deny(user_id, &verified.client.id).await?;
            }
        }
        self.handle(request, user_id, agree).await
    }

    async fn check<'a>(&self, request: &'a AuthorizeRequest) -> OAuth2Result<Validation<'a>> {
        let Some(client_id) = non_empty(request.client_id.as_deref()) else {
            return Ok(Validation::Reject(ProtocolError::invalid_client(
                "No client id supplied",
            )));
        };

        let Some(client) = self.clients.lookup(client_id).await? else {
            return Ok(Validation::Reject(ProtocolError::invalid_client(
                "The client id supplied is invalid",
            )));
        };

        let presented = request.redirect_uri.as_deref().unwrap_or_default();
        if !client.is_redirect_uri_allowed(presented) {
            return Ok(Validation::Reject(ProtocolError::new(
                ErrorKind::RedirectUriMismatch,
                "The redirect URI provided is missing or does not match",
            )));
        }

        let redirect_uri = match (presented, client.redirect_uri.as_str()) {
            ("", "") => return Err(OAuth2Error::MissingRedirectUri(client.id.clone())),
            ("", registered) => registered,
            (presented, _) => presented,
        };
        ensure_absolute(redirect_uri)?;
        let redirect_uri = redirect_uri.to_string();

        let verified = Verified {
            client,
            redirect_uri,
            presented_uri: presented,
            state: non_empty(request.state.as_deref()),
        };

        if request.response_type.as_deref() != Some("code") {
            let error = ProtocolError::invalid_request("Invalid or missing response type");
            return Ok(Validation::Redirect(verified, error));
        }

        if verified.state.is_none() {
            let error = ProtocolError::invalid_request("The state parameter is required");
            return Ok(Validation::Redirect(verified, error));
        }

        Ok(Validation::Valid(verified))
    }
}

fn error_redirect(verified: &Verified<'_>, error: &ProtocolError) -> String {
    let mut params = vec![
        ("error", error.error.as_str()),
        ("error_description", &*error.error_description),
    ];
    if let Some(state) = verified.state {
        params.push(("state", state));
    }
    redirect_with(&verified.redirect_uri, &params)
}

/// Registered and presented URIs are compared byte for byte, so a target
/// that does not parse is a client misconfiguration.
fn ensure_absolute(uri: &str) -> OAuth2Result<()> {
    url::Url::parse(uri)
        .map(|_| ())
        .map_err(|e| OAuth2Error::InvalidRedirectUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

/// Append form-encoded parameters to a redirect URI without normalizing it.
fn redirect_with(uri: &str, params: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = match uri.rfind('?') {
        None => "?",
        Some(pos) if pos + 1 == uri.len() || uri.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{uri}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_keeps_existing_query() {
        let location =
            redirect_with("http://fake.com/cb?tenant=a", &[("code", "x y"), ("state", "s")]);
        assert_eq!(location, "http://fake.com/cb?tenant=a&code=x+y&state=s");
    }

    #[test]
    fn redirect_target_is_not_normalized() {
        assert_eq!(
            redirect_with("http://fake.com", &[("code", "abc"), ("state", "test_state")]),
            "http://fake.com?code=abc&state=test_state"
        );
        assert_eq!(
            redirect_with("HTTP://Fake.COM:80", &[("code", "abc")]),
            "HTTP://Fake.COM:80?code=abc"
        );
        assert_eq!(
            redirect_with("http://fake.com/cb?", &[("code", "abc")]),
            "http://fake.com/cb?code=abc"
        );
    }

    #[test]
    fn unparseable_redirect_is_internal() {
        let err = ensure_absolute("not a uri").unwrap_err();
        assert!(err.is_internal());
        assert!(ensure_absolute("http://fake.com").is_ok());
    }

    #[test]
    fn rejected_outcome_has_no_location() {
        let outcome =
            AuthorizationOutcome::Rejected(ProtocolError::invalid_client("No client id supplied"));
        assert_eq!(outcome.location(), None);
        assert_eq!(
            AuthorizationOutcome::Redirect("http://fake.com/".into()).location(),
            Some("http://fake.com/")
        );
    }
}
