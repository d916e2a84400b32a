//! Member identity tokens
//!
//! A member's identity is a signed token naming the channel and member id. It
//! travels in a cookie set on create/join, or in a bearer header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::api::server::AppState;
use crate::error::{Result, WatchPartyError};
use crate::models::{ChannelId, MemberId};

/// Name of the cookie carrying the identity token
pub const IDENTITY_COOKIE: &str = "watchparty_identity";

/// Identity token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityClaims {
    /// Subject (member id)
    pub sub: String,
    /// Channel the member belongs to
    pub channel: u64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl IdentityClaims {
    pub fn new(channel: ChannelId, member: MemberId, ttl: Duration) -> Result<Self> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| WatchPartyError::Internal("identity expiry out of range".to_string()))?;

        Ok(Self {
            sub: member.to_string(),
            channel: channel.0,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId(self.channel)
    }

    pub fn member_id(&self) -> Result<MemberId> {
        self.sub
            .parse()
            .map(MemberId)
            .map_err(|_| WatchPartyError::InvalidIdentity("malformed subject".to_string()))
    }
}

/// Issues and validates identity tokens
#[derive(Clone)]
pub struct IdentityAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    secure_cookie: bool,
}

impl IdentityAuth {
    /// Create a new identity handler
    ///
    /// If the secret is empty, a random secret is generated; tokens then stop
    /// validating after a restart.
    pub fn new(secret: &str, ttl_hours: i64, secure_cookie: bool) -> Result<Self> {
        let ttl = Duration::try_hours(ttl_hours)
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or_else(|| {
                WatchPartyError::InvalidConfig(format!("identity TTL of {} hours is out of range", ttl_hours))
            })?;

        let key = if secret.is_empty() {
            let mut key_bytes = [0u8; 32];
            OsRng.try_fill_bytes(&mut key_bytes).map_err(|e| {
                error!("Failed to generate identity secret: {}", e);
                WatchPartyError::Internal("system entropy unavailable".to_string())
            })?;

            debug!("Generated random identity secret");
            key_bytes.to_vec()
        } else {
            secret.as_bytes().to_vec()
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            ttl,
            secure_cookie,
        })
    }

    /// Issue a token for a member of a channel
    pub fn issue(&self, channel: ChannelId, member: MemberId) -> Result<String> {
        let claims = IdentityClaims::new(channel, member, self.ttl)?;

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to issue identity token: {}", e);
            WatchPartyError::Internal("failed to issue identity token".to_string())
        })
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<IdentityClaims> {
        decode::<IdentityClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Identity validation failed: {}", e);
                WatchPartyError::InvalidIdentity("token rejected".to_string())
            })
    }

    /// Identity cookie for a freshly issued token
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((IDENTITY_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build()
    }

    /// Issue a token and add it to the cookie jar
    pub fn remember(&self, jar: CookieJar, channel: ChannelId, member: MemberId) -> Result<CookieJar> {
        let token = self.issue(channel, member)?;
        Ok(jar.add(self.cookie(token)))
    }

    /// Read claims from the identity cookie or a bearer header
    pub fn resolve(&self, headers: &HeaderMap) -> Result<IdentityClaims> {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(IDENTITY_COOKIE) {
            return self.validate(cookie.value());
        }

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::extract_token)
            .ok_or(WatchPartyError::MissingIdentity)?;

        self.validate(token)
    }

    /// Extract token from Authorization header
    pub fn extract_token(authorization: &str) -> Option<&str> {
        authorization.strip_prefix("Bearer ")
    }
}

/// Extractor for requests made by a known member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberIdentity {
    pub channel: ChannelId,
    pub member: MemberId,
}

impl MemberIdentity {
    pub fn from_claims(claims: &IdentityClaims) -> Result<Self> {
        Ok(Self {
            channel: claims.channel_id(),
            member: claims.member_id()?,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MemberIdentity {
    type Rejection = WatchPartyError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let claims = state.identity.resolve(&parts.headers)?;
        Self::from_claims(&claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_issue_and_validate() {
        let auth = IdentityAuth::new("test-secret", 24, false).unwrap();

        let token = auth.issue(ChannelId(3), MemberId(2)).unwrap();
        let claims = auth.validate(&token).unwrap();

        assert_eq!(claims.channel_id(), ChannelId(3));
        assert_eq!(claims.member_id().unwrap(), MemberId(2));
    }

    #[test]
    fn test_random_secret() {
        let auth = IdentityAuth::new("", 24, false).unwrap();
        let token = auth.issue(ChannelId(1), MemberId(1)).unwrap();
        assert!(auth.validate(&token).is_ok());

        // A different process secret rejects the token
        let other = IdentityAuth::new("", 24, false).unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_invalid_and_expired_tokens() {
        let auth = IdentityAuth::new("test-secret", 24, false).unwrap();
        assert!(matches!(
            auth.validate("invalid.token.here"),
            Err(WatchPartyError::InvalidIdentity(_))
        ));

        let expired = IdentityAuth::new("test-secret", -1, false).unwrap();
        let token = expired.issue(ChannelId(1), MemberId(1)).unwrap();
        assert!(matches!(
            auth.validate(&token),
            Err(WatchPartyError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_out_of_range_ttl_is_rejected() {
        assert!(matches!(
            IdentityAuth::new("s", 10_000_000_000_000, false),
            Err(WatchPartyError::InvalidConfig(_))
        ));
        assert!(matches!(
            IdentityAuth::new("s", i64::MAX, false),
            Err(WatchPartyError::InvalidConfig(_))
        ));

        let auth = IdentityAuth::new("s", crate::config::MAX_IDENTITY_TTL_HOURS, false).unwrap();
        assert!(auth.issue(ChannelId(1), MemberId(1)).is_ok());
    }

    #[test]
    fn test_resolve_from_cookie_or_bearer() {
        let auth = IdentityAuth::new("test-secret", 24, false).unwrap();
        let token = auth.issue(ChannelId(5), MemberId(4)).unwrap();

        let mut headers = HeaderMap::new();
        assert!(matches!(
            auth.resolve(&headers),
            Err(WatchPartyError::MissingIdentity)
        ));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", IDENTITY_COOKIE, token)).unwrap(),
        );
        let claims = auth.resolve(&headers).unwrap();
        assert_eq!(
            MemberIdentity::from_claims(&claims).unwrap(),
            MemberIdentity {
                channel: ChannelId(5),
                member: MemberId(4)
            }
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(auth.resolve(&headers).unwrap().member_id().unwrap(), MemberId(4));
    }

    #[test]
    fn test_cookie_attributes() {
        let auth = IdentityAuth::new("test-secret", 24, true).unwrap();
        let cookie = auth.cookie("abc".to_string());

        assert_eq!(cookie.name(), IDENTITY_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(IdentityAuth::extract_token("Bearer abc123"), Some("abc123"));
        assert_eq!(IdentityAuth::extract_token("abc123"), None);
    }
}
