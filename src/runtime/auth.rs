//! Sign-In
//!
//! Validates ID tokens from an external identity provider and classifies
//! provider sign-in failures. This crate never issues tokens.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Digest};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::game::state::UserId;

/// Provider error code for a popup the user closed.
pub const CODE_POPUP_CLOSED: &str = "auth/popup-closed-by-user";
/// Provider error code for a popup superseded by another request.
pub const CODE_POPUP_CANCELLED: &str = "auth/cancelled-popup-request";
/// Provider error code for a host not on the allow-list.
pub const CODE_UNAUTHORIZED_DOMAIN: &str = "auth/unauthorized-domain";

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected issuer. If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience. If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format.
    pub public_key_pem: Option<String>,
    /// HS256 secret.
    pub secret: Option<String>,
    /// Skip expiry validation (testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Create config from `MATHMIND_AUTH_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("MATHMIND_AUTH_ISSUER").ok(),
            audience: std::env::var("MATHMIND_AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("MATHMIND_AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("MATHMIND_AUTH_SECRET").ok(),
            skip_expiry: std::env::var("MATHMIND_AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Check if a verification key is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// A signed-in user as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable id used by the session.
    pub id: UserId,
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
}

impl UserIdentity {
    /// Name for greetings: display name, then email, then the id.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_uuid_string())
    }
}

/// Stable [`UserId`] for a provider subject.
pub fn user_id_for_subject(subject: &str) -> UserId {
    let hash = Sha256::new()
        .chain_update(b"mathmind-user:")
        .chain_update(subject.as_bytes())
        .finalize();

    let mut id = [0u8; 16];
    id.copy_from_slice(&hash[..16]);
    UserId::new(id)
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No verification key configured.
    #[error("authentication not configured")]
    NotConfigured,
    /// The configured key could not be loaded.
    #[error("invalid verification key: {0}")]
    InvalidKey(String),
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Signature, issuer, audience or format check failed.
    #[error("token rejected: {0}")]
    Rejected(String),
    /// Token has no subject.
    #[error("token has no subject")]
    MissingSubject,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Rejected(err.to_string()),
        }
    }
}

/// Claims read from an ID token. Expiry, issuer and audience are checked
/// by the decoder and not kept.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies ID tokens against one configured key.
pub struct IdTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl IdTokenVerifier {
    /// Load the key and validation rules. RS256 wins when both keys are set.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let (key, algorithm) = match (&config.public_key_pem, &config.secret) {
            (Some(pem), _) => (
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| AuthError::InvalidKey(e.to_string()))?,
                Algorithm::RS256,
            ),
            (None, Some(secret)) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, None) => return Err(AuthError::NotConfigured),
        };

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.leeway = 0;
        validation.validate_exp = !config.skip_expiry;
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self { key, validation })
    }

    /// Verify a token and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let claims = decode::<IdTokenClaims>(token, &self.key, &self.validation)?.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(UserIdentity {
            id: user_id_for_subject(&claims.sub),
            display_name: claims.name,
            email: claims.email,
        })
    }
}

impl std::fmt::Debug for IdTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

/// Verify a token against `config` and log the outcome.
pub fn sign_in_with_token(token: &str, config: &AuthConfig) -> Result<UserIdentity, AuthError> {
    match IdTokenVerifier::new(config).and_then(|verifier| verifier.verify(token)) {
        Ok(identity) => {
            info!("Signed in as {}", identity.label());
            Ok(identity)
        }
        Err(e) => {
            warn!("Rejected ID token: {}", e);
            Err(e)
        }
    }
}

// =============================================================================
// SIGN-IN FAILURES
// =============================================================================

/// Why a provider sign-in attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignInFailure {
    /// The user dismissed the sign-in flow.
    #[error("sign-in cancelled")]
    Cancelled,
    /// The current host is not authorized with the provider.
    #[error("domain not authorized for sign-in")]
    UnauthorizedDomain,
    /// Anything else the provider reported.
    #[error("sign-in failed ({code}): {message}")]
    Provider {
        /// Provider error code
        code: String,
        /// Provider message
        message: String,
    },
}

impl SignInFailure {
    /// Classify a provider error code.
    pub fn classify(code: &str, message: &str) -> Self {
        match code {
            CODE_POPUP_CLOSED | CODE_POPUP_CANCELLED => SignInFailure::Cancelled,
            CODE_UNAUTHORIZED_DOMAIN => SignInFailure::UnauthorizedDomain,
            _ => SignInFailure::Provider {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// Whether the player should be told something went wrong.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, SignInFailure::Cancelled)
    }

    /// Log the failure at the level it deserves. Cancellations are silent.
    pub fn report(&self) {
        match self {
            SignInFailure::Cancelled => {}
            SignInFailure::UnauthorizedDomain => error!(
                "Sign-in failed: this domain is not authorized. Add it to the \
                 authorized domains list in the identity provider console."
            ),
            SignInFailure::Provider { code, message } => {
                error!("Sign-in failed ({}): {}", code, message)
            }
        }
    }
}

/// Classify and report a provider sign-in error.
pub fn handle_sign_in_error(code: &str, message: &str) -> SignInFailure {
    let failure = SignInFailure::classify(code, message);
    failure.report();
    failure
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const SECRET: &str = "test-secret-key-256-bits-long!!";

    fn create_test_token(claims: &Value, secret: &str) -> String {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&header, claims, &key).unwrap()
    }

    fn test_claims() -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "sub": "learner-42",
            "exp": now + 3600,
            "iat": now,
            "iss": "test-issuer",
            "aud": "mathmind",
            "email": "ada@example.com",
            "name": "Ada",
        })
    }

    fn secret_config() -> AuthConfig {
        AuthConfig {
            secret: Some(SECRET.into()),
            ..Default::default()
        }
    }

    fn verify(token: &str, config: &AuthConfig) -> Result<UserIdentity, AuthError> {
        IdTokenVerifier::new(config)?.verify(token)
    }

    #[test]
    fn test_valid_token() {
        let token = create_test_token(&test_claims(), SECRET);

        let identity = verify(&token, &secret_config()).unwrap();
        assert_eq!(identity.id, user_id_for_subject("learner-42"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = test_claims();
        claims["exp"] = json!(1);
        let token = create_test_token(&claims, SECRET);

        assert!(matches!(verify(&token, &secret_config()), Err(AuthError::Expired)));

        let lenient = AuthConfig { skip_expiry: true, ..secret_config() };
        assert!(verify(&token, &lenient).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_test_token(&test_claims(), "correct-secret-key-here!!!!!");
        let config = AuthConfig {
            secret: Some("wrong-secret-key-here!!!!!!".into()),
            ..Default::default()
        };

        assert!(matches!(verify(&token, &config), Err(AuthError::Rejected(_))));
        assert!(matches!(verify("not-a-token", &config), Err(AuthError::Rejected(_))));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let mut claims = test_claims();
        claims["sub"] = json!("");
        let token = create_test_token(&claims, SECRET);

        assert!(matches!(verify(&token, &secret_config()), Err(AuthError::MissingSubject)));
    }

    #[test]
    fn test_issuer_and_audience_checks() {
        let token = create_test_token(&test_claims(), SECRET);

        let wrong_issuer = AuthConfig { issuer: Some("elsewhere".into()), ..secret_config() };
        assert!(matches!(verify(&token, &wrong_issuer), Err(AuthError::Rejected(_))));

        let wrong_audience = AuthConfig { audience: Some("other-app".into()), ..secret_config() };
        assert!(matches!(verify(&token, &wrong_audience), Err(AuthError::Rejected(_))));

        let matching = AuthConfig {
            issuer: Some("test-issuer".into()),
            audience: Some("mathmind".into()),
            ..secret_config()
        };
        assert!(verify(&token, &matching).is_ok());
    }

    #[test]
    fn test_key_configuration() {
        assert!(matches!(
            IdTokenVerifier::new(&AuthConfig::default()),
            Err(AuthError::NotConfigured)
        ));

        let bad_pem = AuthConfig { public_key_pem: Some("not a pem".into()), ..Default::default() };
        assert!(matches!(IdTokenVerifier::new(&bad_pem), Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn test_user_id_is_stable_per_subject() {
        assert_eq!(user_id_for_subject("learner-42"), user_id_for_subject("learner-42"));
        assert_ne!(user_id_for_subject("learner-42"), user_id_for_subject("learner-43"));
    }

    #[test]
    fn test_identity_label_fallbacks() {
        let mut identity = UserIdentity {
            id: user_id_for_subject("learner-42"),
            display_name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
        };
        assert_eq!(identity.label(), "Ada");

        identity.display_name = None;
        assert_eq!(identity.label(), "ada@example.com");

        identity.email = None;
        assert_eq!(identity.label(), identity.id.to_uuid_string());
    }

    #[test]
    fn test_sign_in_with_token() {
        let token = create_test_token(&test_claims(), SECRET);
        let identity = sign_in_with_token(&token, &secret_config()).unwrap();
        assert_eq!(identity.id, user_id_for_subject("learner-42"));

        assert!(sign_in_with_token("garbage", &secret_config()).is_err());
        assert!(matches!(
            sign_in_with_token(&token, &AuthConfig::default()),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(SignInFailure::classify(CODE_POPUP_CLOSED, ""), SignInFailure::Cancelled);
        assert_eq!(SignInFailure::classify(CODE_POPUP_CANCELLED, ""), SignInFailure::Cancelled);
        assert_eq!(
            SignInFailure::classify(CODE_UNAUTHORIZED_DOMAIN, "host"),
            SignInFailure::UnauthorizedDomain
        );

        let other = handle_sign_in_error("auth/network-request-failed", "offline");
        assert_eq!(
            other,
            SignInFailure::Provider {
                code: "auth/network-request-failed".into(),
                message: "offline".into(),
            }
        );
        assert!(other.is_user_visible());
        assert!(!SignInFailure::Cancelled.is_user_visible());
    }
}
