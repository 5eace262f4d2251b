//! Credential acquisition
//!
//! Each store authenticates differently:
//!
//! - **Chrome Web Store**: OAuth2 refresh-token grant against Google
//! - **Edge Add-ons**: OAuth2 client-credentials grant against Azure AD
//! - **addons.mozilla.org**: locally signed HS256 JWT, no network call
//!
//! Credentials are never cached. Adapters ask for a fresh one per verb
//! (Chrome), per request including every poll tick (Edge), or per HTTP
//! request (Firefox, whose assertion expires after five minutes while a
//! signing wait can take twenty).

use crate::clock::Clock;
use crate::error::{Result, StoreError};
use crate::transport::{HttpRequest, HttpTransport};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Redirect URI Google expects for installed-app refresh tokens
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Scope of the Edge Add-ons API
pub const EDGE_SCOPE: &str = "https://api.addons.microsoftedge.microsoft.com/.default";

/// Lifetime of a signed assertion
pub const ASSERTION_LIFETIME_SECS: i64 = 5 * 60;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Which scheme produced a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    RefreshTokenOAuth,
    ClientCredentialsOAuth,
    SignedAssertion,
}

/// A short-lived credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub kind: CredentialKind,
    pub bearer_token: String,
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Value for the `Authorization` header
    ///
    /// OAuth tokens use the `Bearer` scheme, signed assertions `JWT`.
    pub fn authorization_header(&self) -> String {
        match self.kind {
            CredentialKind::SignedAssertion => format!("JWT {}", self.bearer_token),
            _ => format!("Bearer {}", self.bearer_token),
        }
    }
}

/// OAuth2 refresh-token grant (Chrome Web Store)
#[derive(Debug, Clone)]
pub struct RefreshTokenAuth {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// OAuth2 client-credentials grant (Edge Add-ons)
#[derive(Debug, Clone)]
pub struct ClientCredentialsAuth {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

/// Locally signed JWT (addons.mozilla.org)
#[derive(Debug, Clone)]
pub struct SignedAssertionAuth {
    /// JWT issuer, the AMO API key
    pub issuer: String,
    /// HMAC secret, the AMO API secret
    pub secret: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    iat: i64,
    exp: i64,
}

/// One credential capability, three schemes
#[derive(Debug, Clone)]
pub enum Authenticator {
    RefreshToken(RefreshTokenAuth),
    ClientCredentials(ClientCredentialsAuth),
    SignedAssertion(SignedAssertionAuth),
}

impl Authenticator {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Authenticator::RefreshToken(_) => CredentialKind::RefreshTokenOAuth,
            Authenticator::ClientCredentials(_) => CredentialKind::ClientCredentialsOAuth,
            Authenticator::SignedAssertion(_) => CredentialKind::SignedAssertion,
        }
    }

    /// Produce a fresh credential
    pub async fn obtain_credential(
        &self,
        transport: &dyn HttpTransport,
        clock: &dyn Clock,
    ) -> Result<Credential> {
        let issued_at = clock.now();

        let bearer_token = match self {
            Authenticator::RefreshToken(cfg) => {
                let request = HttpRequest::post(&cfg.token_url)
                    .form([
                        ("client_id", cfg.client_id.as_str()),
                        ("client_secret", cfg.client_secret.as_str()),
                        ("refresh_token", cfg.refresh_token.as_str()),
                        ("grant_type", "refresh_token"),
                        ("redirect_uri", OOB_REDIRECT_URI),
                    ])
                    .timeout(TOKEN_REQUEST_TIMEOUT);
                exchange(transport, request).await?
            }
            Authenticator::ClientCredentials(cfg) => {
                let request = HttpRequest::post(&cfg.token_url)
                    .form([
                        ("client_id", cfg.client_id.as_str()),
                        ("scope", cfg.scope.as_str()),
                        ("client_secret", cfg.client_secret.as_str()),
                        ("grant_type", "client_credentials"),
                    ])
                    .timeout(TOKEN_REQUEST_TIMEOUT);
                exchange(transport, request).await?
            }
            Authenticator::SignedAssertion(cfg) => sign_assertion(cfg, issued_at)?,
        };

        Ok(Credential {
            kind: self.kind(),
            bearer_token,
            issued_at,
        })
    }
}

/// POST a token request and pull `access_token` out of the reply
async fn exchange(transport: &dyn HttpTransport, request: HttpRequest) -> Result<String> {
    debug!(url = %request.url, "Requesting access token");

    let response = transport.execute(request).await?;

    if response.status != 200 {
        return Err(StoreError::AuthenticationFailed(format!(
            "got code {}, body: {}",
            response.status,
            response.text()
        )));
    }

    let body: serde_json::Value = serde_json::from_slice(&response.body).map_err(|e| {
        StoreError::AuthenticationFailed(format!("malformed token response: {}", e))
    })?;

    match body.get("access_token").and_then(|v| v.as_str()) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => {
            let reason = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| response.text());
            Err(StoreError::AuthenticationFailed(format!(
                "no access token in response: {}",
                reason
            )))
        }
    }
}

fn sign_assertion(cfg: &SignedAssertionAuth, now: DateTime<Utc>) -> Result<String> {
    if cfg.issuer.is_empty() || cfg.secret.is_empty() {
        return Err(StoreError::InvalidCredentials(
            "JWT issuer and secret must not be empty".to_string(),
        ));
    }

    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &cfg.issuer,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{ManualClock, StubTransport};
    use crate::transport::{HttpMethod, HttpResponse, RequestBody};
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde::Deserialize;

    fn chrome_auth(url: &str) -> Authenticator {
        Authenticator::RefreshToken(RefreshTokenAuth {
            token_url: url.to_string(),
            client_id: "client id".to_string(),
            client_secret: "client secret".to_string(),
            refresh_token: "refresh token".to_string(),
        })
    }

    fn edge_auth(url: &str) -> Authenticator {
        Authenticator::ClientCredentials(ClientCredentialsAuth {
            token_url: url.to_string(),
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            scope: EDGE_SCOPE.to_string(),
        })
    }

    fn form_of(request: &HttpRequest) -> Vec<(String, String)> {
        match &request.body {
            RequestBody::Form(fields) => fields.clone(),
            other => panic!("expected form body, got {:?}", other),
        }
    }

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_refresh_token_grant() {
        let transport = StubTransport::new(|_| {
            Ok(HttpResponse::new(200, r#"{"access_token":"access token"}"#))
        });
        let clock = ManualClock::default();

        let credential = chrome_auth("https://oauth.test/token")
            .obtain_credential(&transport, &clock)
            .await
            .unwrap();

        assert_eq!(credential.bearer_token, "access token");
        assert_eq!(credential.kind, CredentialKind::RefreshTokenOAuth);
        assert_eq!(credential.issued_at, clock.now());
        assert_eq!(credential.authorization_header(), "Bearer access token");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://oauth.test/token");

        let fields = form_of(&requests[0]);
        assert_eq!(field(&fields, "client_id"), Some("client id"));
        assert_eq!(field(&fields, "client_secret"), Some("client secret"));
        assert_eq!(field(&fields, "refresh_token"), Some("refresh token"));
        assert_eq!(field(&fields, "grant_type"), Some("refresh_token"));
        assert_eq!(field(&fields, "redirect_uri"), Some(OOB_REDIRECT_URI));
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let transport = StubTransport::new(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"token_type":"Bearer","expires_in":3599,"access_token":"test_access_token"}"#,
            ))
        });

        let credential = edge_auth("https://login.test/token")
            .obtain_credential(&transport, &ManualClock::default())
            .await
            .unwrap();

        assert_eq!(credential.bearer_token, "test_access_token");
        assert_eq!(credential.kind, CredentialKind::ClientCredentialsOAuth);

        let fields = form_of(&transport.requests()[0]);
        assert_eq!(field(&fields, "client_id"), Some("test_client_id"));
        assert_eq!(field(&fields, "client_secret"), Some("test_client_secret"));
        assert_eq!(field(&fields, "scope"), Some(EDGE_SCOPE));
        assert_eq!(field(&fields, "grant_type"), Some("client_credentials"));
    }

    #[tokio::test]
    async fn test_non_200_is_auth_error() {
        for auth in [chrome_auth("https://t/"), edge_auth("https://t/")] {
            let transport = StubTransport::new(|_| {
                Ok(HttpResponse::new(
                    400,
                    r#"{"error":"invalid_grant","access_token":"leaked"}"#,
                ))
            });
            let err = auth
                .obtain_credential(&transport, &ManualClock::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Auth);
            assert!(err.to_string().contains("got code 400"));
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_auth_error() {
        for body in [
            "not json",
            r#"{"token_type":"Bearer"}"#,
            r#"{"access_token":42}"#,
            r#"{"error_description":"Token has been expired or revoked."}"#,
        ] {
            let transport = StubTransport::new(move |_| Ok(HttpResponse::new(200, body)));
            let err = chrome_auth("https://t/")
                .obtain_credential(&transport, &ManualClock::default())
                .await
                .unwrap_err();
            assert!(
                matches!(err, StoreError::AuthenticationFailed(_)),
                "body {body} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_error_description_is_reported() {
        let transport = StubTransport::new(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"error_description":"Token has been expired or revoked."}"#,
            ))
        });
        let err = edge_auth("https://t/")
            .obtain_credential(&transport, &ManualClock::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expired or revoked"));
    }

    #[derive(Debug, Deserialize)]
    struct Claims {
        iss: String,
        iat: i64,
        exp: i64,
    }

    #[tokio::test]
    async fn test_signed_assertion() {
        let transport = StubTransport::new(|_| panic!("no network expected"));
        let clock = ManualClock::at(Utc::now());
        let auth = Authenticator::SignedAssertion(SignedAssertionAuth {
            issuer: "user:12345:67".to_string(),
            secret: "test_client_secret".to_string(),
        });

        let credential = auth.obtain_credential(&transport, &clock).await.unwrap();
        assert!(transport.requests().is_empty());
        assert_eq!(credential.kind, CredentialKind::SignedAssertion);

        let header = credential.authorization_header();
        assert!(header.starts_with("JWT "));

        let token = decode::<Claims>(
            &credential.bearer_token,
            &DecodingKey::from_secret(b"test_client_secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(token.claims.iss, "user:12345:67");
        assert_eq!(token.claims.iat, clock.now().timestamp());
        assert_eq!(token.claims.exp, token.claims.iat + ASSERTION_LIFETIME_SECS);
    }

    #[tokio::test]
    async fn test_signed_assertion_changes_with_time() {
        let transport = StubTransport::new(|_| panic!("no network expected"));
        let clock = ManualClock::default();
        let auth = Authenticator::SignedAssertion(SignedAssertionAuth {
            issuer: "issuer".to_string(),
            secret: "secret".to_string(),
        });

        let first = auth.obtain_credential(&transport, &clock).await.unwrap();
        let same = auth.obtain_credential(&transport, &clock).await.unwrap();
        clock.advance(Duration::from_secs(1));
        let later = auth.obtain_credential(&transport, &clock).await.unwrap();

        assert_eq!(first.bearer_token, same.bearer_token);
        assert_ne!(first.bearer_token, later.bearer_token);
    }

    #[tokio::test]
    async fn test_signed_assertion_requires_secret() {
        let transport = StubTransport::new(|_| panic!("no network expected"));
        let auth = Authenticator::SignedAssertion(SignedAssertionAuth {
            issuer: "issuer".to_string(),
            secret: String::new(),
        });
        let err = auth
            .obtain_credential(&transport, &ManualClock::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}
