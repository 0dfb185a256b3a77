//! JWT token generation and validation.
//!
//! Two token kinds share one signing key: short-lived access tokens that gate
//! API calls and longer-lived refresh tokens that can only be exchanged for a
//! new access token. The `extra.type` claim keeps them apart.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::Principal;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on every API call
    AccessToken,
    /// Long-lived token exchanged for new access tokens
    RefreshToken,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AccessToken => "access_token",
            TokenType::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application claims nested under `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraClaims {
    /// Token type
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Database ID of the user the token was issued to
    pub user_id: i64,
    /// Access token lifetime in seconds (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires: Option<u64>,
    /// Refresh token lifetime in seconds (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires: Option<u64>,
}

impl ExtraClaims {
    pub fn access(user_id: i64, lifetime: Duration) -> Self {
        Self {
            token_type: TokenType::AccessToken,
            user_id,
            access_token_expires: Some(lifetime.as_secs()),
            refresh_token_expires: None,
        }
    }

    pub fn refresh(user_id: i64, lifetime: Duration) -> Self {
        Self {
            token_type: TokenType::RefreshToken,
            user_id,
            access_token_expires: None,
            refresh_token_expires: Some(lifetime.as_secs()),
        }
    }
}

/// Full JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (username)
    pub sub: String,
    /// Copy of the user's admin flag. Never used for access decisions.
    #[serde(default)]
    pub is_admin: bool,
    pub extra: ExtraClaims,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 15 minutes
pub const ACCESS_TOKEN_DURATION: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 1 week
pub const REFRESH_TOKEN_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Start at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now())
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Signing configuration, loaded once at startup.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    /// HS256 settings with the default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
            algorithm: Algorithm::HS256,
            access_ttl: ACCESS_TOKEN_DURATION,
            refresh_ttl: REFRESH_TOKEN_DURATION,
        }
    }
}

/// Issues and verifies signed, typed, expiring tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(settings: &TokenSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(settings.algorithm);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(&settings.secret),
            decoding_key: DecodingKey::from_secret(&settings.secret),
            algorithm: settings.algorithm,
            validation,
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            clock,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a token for `subject` that expires `valid_for` from now.
    pub fn issue(
        &self,
        subject: &str,
        is_admin: bool,
        extra: ExtraClaims,
        valid_for: Duration,
    ) -> Result<String, JwtError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            is_admin,
            extra,
            exp: self.clock.now().saturating_add(valid_for.as_secs()),
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(JwtError::Creation)
    }

    /// Generate an access token for a user.
    pub fn issue_access(&self, principal: &Principal) -> Result<String, JwtError> {
        self.issue(
            &principal.username,
            principal.is_admin,
            ExtraClaims::access(principal.id, self.access_ttl),
            self.access_ttl,
        )
    }

    /// Generate a refresh token for a user.
    pub fn issue_refresh(&self, principal: &Principal) -> Result<String, JwtError> {
        self.issue(
            &principal.username,
            principal.is_admin,
            ExtraClaims::refresh(principal.id, self.refresh_ttl),
            self.refresh_ttl,
        )
    }

    /// Validate a token of the expected type and return its subject.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<String, JwtError> {
        let claims = self.decode(token)?;

        if claims.extra.token_type != expected {
            return Err(JwtError::WrongType {
                expected,
                found: claims.extra.token_type,
            });
        }

        Ok(claims.sub)
    }

    /// Check signature and expiry, without looking at the token type.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, JwtError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e),
            })?;

        // The library compares against the wall clock; ours may be ahead of it.
        if self.clock.now() >= data.claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(data.claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Signing failed (bad key or algorithm configuration)
    Creation(jsonwebtoken::errors::Error),
    /// Bad signature, malformed token or unexpected claims
    Invalid(jsonwebtoken::errors::Error),
    /// The token's expiry has passed
    Expired,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongType {
        expected: TokenType,
        found: TokenType,
    },
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Creation(_) => write!(f, "Authentication Error: Error creating token"),
            JwtError::Invalid(_) => write!(f, "Authentication Error: Token is not valid"),
            JwtError::Expired => write!(f, "Authentication Error: Token is expired"),
            JwtError::WrongType { .. } => write!(f, "Authentication Error: Token type is not valid"),
        }
    }
}

impl std::error::Error for JwtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JwtError::Creation(e) | JwtError::Invalid(e) => Some(e),
            JwtError::Expired | JwtError::WrongType { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Permission;

    const SECRET: &[u8] = b"test-secret-key-for-testing-tokens";

    fn alice() -> Principal {
        Principal {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            is_admin: false,
            permissions: [Permission::ViewProduct].into_iter().collect(),
        }
    }

    fn authority_with_clock() -> (TokenAuthority, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let authority = TokenAuthority::with_clock(&TokenSettings::new(SECRET), clock.clone());
        (authority, clock)
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));

        let token = authority
            .issue(
                "alice",
                false,
                ExtraClaims::access(7, Duration::from_secs(15 * 60)),
                Duration::from_secs(15 * 60),
            )
            .unwrap();

        assert_eq!(token.split('.').count(), 3);
        let subject = authority.verify(&token, TokenType::AccessToken).unwrap();
        assert_eq!(subject, "alice");
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));

        let token = authority.issue_refresh(&alice()).unwrap();

        let subject = authority.verify(&token, TokenType::RefreshToken).unwrap();
        assert_eq!(subject, "alice");
    }

    #[test]
    fn test_claims_layout() {
        let (authority, clock) = authority_with_clock();

        let token = authority.issue_access(&alice()).unwrap();
        let claims = authority.decode(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert!(!claims.is_admin);
        assert_eq!(claims.extra.token_type, TokenType::AccessToken);
        assert_eq!(claims.extra.user_id, 7);
        assert_eq!(
            claims.extra.access_token_expires,
            Some(ACCESS_TOKEN_DURATION.as_secs())
        );
        assert_eq!(claims.extra.refresh_token_expires, None);
        assert_eq!(claims.exp, clock.now() + ACCESS_TOKEN_DURATION.as_secs());
    }

    #[test]
    fn test_wire_format_nests_type_under_extra() {
        let claims = TokenClaims {
            sub: "alice".to_string(),
            is_admin: true,
            extra: ExtraClaims::refresh(7, Duration::from_secs(60)),
            exp: 1_700_000_000,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "alice");
        assert_eq!(json["exp"], 1_700_000_000u64);
        assert_eq!(json["extra"]["type"], "refresh_token");
        assert_eq!(json["extra"]["user_id"], 7);
        assert_eq!(json["extra"]["refresh_token_expires"], 60);
        assert!(json["extra"].get("access_token_expires").is_none());
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));

        let access = authority.issue_access(&alice()).unwrap();
        let refresh = authority.issue_refresh(&alice()).unwrap();

        assert!(matches!(
            authority.verify(&access, TokenType::RefreshToken),
            Err(JwtError::WrongType {
                expected: TokenType::RefreshToken,
                found: TokenType::AccessToken,
            })
        ));
        assert!(matches!(
            authority.verify(&refresh, TokenType::AccessToken),
            Err(JwtError::WrongType {
                expected: TokenType::AccessToken,
                found: TokenType::RefreshToken,
            })
        ));
    }

    #[test]
    fn test_invalid_token() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));

        let result = authority.verify("invalid-token", TokenType::AccessToken);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let ours = TokenAuthority::new(&TokenSettings::new(b"secret-1-secret-1-secret-1-secret-1"));
        let theirs = TokenAuthority::new(&TokenSettings::new(b"secret-2-secret-2-secret-2-secret-2"));

        let token = theirs.issue_access(&alice()).unwrap();

        let result = ours.verify(&token, TokenType::AccessToken);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expired_token_rejected_by_decoder() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));
        let now = SystemClock.now();

        // Expired 50 seconds ago, correctly signed
        let claims = TokenClaims {
            sub: "alice".to_string(),
            is_admin: false,
            extra: ExtraClaims::access(7, Duration::from_secs(60)),
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let result = authority.verify(&token, TokenType::AccessToken);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_expired_token_rejected_by_clock() {
        let (authority, clock) = authority_with_clock();

        let token = authority.issue_refresh(&alice()).unwrap();
        assert!(authority.verify(&token, TokenType::RefreshToken).is_ok());

        // The wall clock has not moved, so only our own expiry check can fire
        clock.advance(REFRESH_TOKEN_DURATION + Duration::from_secs(1));

        let result = authority.verify(&token, TokenType::RefreshToken);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_expires_exactly_at_exp() {
        let (authority, clock) = authority_with_clock();

        let token = authority
            .issue(
                "alice",
                false,
                ExtraClaims::access(7, Duration::from_secs(30)),
                Duration::from_secs(30),
            )
            .unwrap();

        clock.advance(Duration::from_secs(29));
        assert!(authority.verify(&token, TokenType::AccessToken).is_ok());

        clock.advance(Duration::from_secs(1));
        assert!(matches!(
            authority.verify(&token, TokenType::AccessToken),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_unknown_token_type_is_invalid() {
        let authority = TokenAuthority::new(&TokenSettings::new(SECRET));
        let payload = serde_json::json!({
            "sub": "alice",
            "is_admin": false,
            "extra": { "type": "session_token", "user_id": 7 },
            "exp": SystemClock.now() + 60,
        });
        let token = jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let result = authority.verify(&token, TokenType::AccessToken);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_misconfigured_algorithm_fails_creation() {
        let settings = TokenSettings {
            algorithm: Algorithm::RS256,
            ..TokenSettings::new(SECRET)
        };
        let authority = TokenAuthority::new(&settings);

        let result = authority.issue_access(&alice());
        assert!(matches!(result, Err(JwtError::Creation(_))));
    }

    #[test]
    fn test_configured_algorithm_in_header() {
        let settings = TokenSettings {
            algorithm: Algorithm::HS512,
            ..TokenSettings::new(SECRET)
        };
        let authority = TokenAuthority::new(&settings);

        let token = authority.issue_access(&alice()).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);

        // An HS256 verifier with the same secret refuses it
        let hs256 = TokenAuthority::new(&TokenSettings::new(SECRET));
        assert!(matches!(
            hs256.verify(&token, TokenType::AccessToken),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            JwtError::Expired.to_string(),
            "Authentication Error: Token is expired"
        );
        assert_eq!(
            JwtError::WrongType {
                expected: TokenType::AccessToken,
                found: TokenType::RefreshToken,
            }
            .to_string(),
            "Authentication Error: Token type is not valid"
        );
    }
}
