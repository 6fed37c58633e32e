//! The token manager: mint, parse, validate, consume, publish.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};

use crate::claims::{ClaimsBody, CodeClaims, Signed, TokenKind};
use crate::code_store::CodeStore;
use crate::error::{TokenError, TokenResult};
use crate::jwks::JsonWebKeySet;
use crate::keys::SigningKey;

/// Accepted clock skew when checking `iat`, in seconds.
const CLOCK_SKEW: i64 = 30;

/// Mints and verifies every signed artifact the provider hands out.
///
/// Cheap to share behind an `Arc`; the only interior mutability is the
/// consumed-code set.
#[derive(Debug)]
pub struct TokenManager {
    issuer: String,
    key: SigningKey,
    codes: CodeStore,
}

impl TokenManager {
    /// Creates a manager for an issuer and signing key.
    #[must_use]
    pub fn new(issuer: impl Into<String>, key: SigningKey) -> Self {
        Self {
            issuer: issuer.into(),
            key,
            codes: CodeStore::default(),
        }
    }

    /// The issuer embedded in every minted token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The active signing key.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// Mints a compact signed token of the body's kind.
    ///
    /// The payload is extended with `iss`, `iat`, `exp`, and the stable
    /// `typ` for the kind.
    ///
    /// # Errors
    ///
    /// Fails only on signer error ([`TokenError::Signing`]).
    pub fn mint<T: ClaimsBody>(&self, body: T, ttl: Duration) -> TokenResult<String> {
        let now = Utc::now().timestamp();
        let signed = Signed {
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            typ: T::KIND.typ().to_string(),
            body,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.kid().to_string());

        encode(&header, &signed, self.key.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Decodes a token, verifies its signature, and checks kind and expiry.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] when the compact form cannot be decoded
    /// - [`TokenError::InvalidSignature`] when verification fails
    /// - [`TokenError::WrongType`] when `typ` does not match the kind
    /// - [`TokenError::Expired`] when `now >= exp`
    pub fn parse<T: ClaimsBody>(&self, token: &str) -> TokenResult<Signed<T>> {
        let mut validation = Validation::new(Algorithm::RS256);
        // Audience and expiry are this manager's business, not the JWT layer's.
        validation.validate_aud = false;
        validation.validate_exp = false;

        // Decode the envelope first so a wrong `typ` is reported as such
        // rather than as a field mismatch of the expected body.
        let data = decode::<Signed<serde_json::Value>>(token, self.key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;
        let envelope = data.claims;

        if envelope.typ != T::KIND.typ() {
            return Err(TokenError::WrongType {
                expected: T::KIND,
                found: envelope.typ,
            });
        }

        if Utc::now().timestamp() >= envelope.exp {
            return Err(TokenError::Expired);
        }

        let body: T = serde_json::from_value(envelope.body)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(Signed {
            iss: envelope.iss,
            iat: envelope.iat,
            exp: envelope.exp,
            typ: envelope.typ,
            body,
        })
    }

    /// Validates envelope claims against this issuer.
    ///
    /// # Errors
    ///
    /// - [`TokenError::WrongIssuer`] when `iss` differs
    /// - [`TokenError::Expired`] when `now >= exp`
    /// - [`TokenError::IssuedInFuture`] when `iat > now + 30s`
    pub fn validate<T>(&self, signed: &Signed<T>) -> TokenResult<()> {
        let now = Utc::now().timestamp();

        if signed.iss != self.issuer {
            return Err(TokenError::WrongIssuer);
        }
        if now >= signed.exp {
            return Err(TokenError::Expired);
        }
        if signed.iat > now + CLOCK_SKEW {
            return Err(TokenError::IssuedInFuture);
        }

        Ok(())
    }

    /// Parses and validates in one step.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::parse`] or [`Self::validate`].
    pub fn parse_validated<T: ClaimsBody>(&self, token: &str) -> TokenResult<Signed<T>> {
        let signed = self.parse::<T>(token)?;
        self.validate(&signed)?;
        Ok(signed)
    }

    /// Redeems an authorization code, atomically and at most once.
    ///
    /// # Errors
    ///
    /// Any parse/validate error, or [`TokenError::AlreadyUsed`] for every
    /// redemption but the first.
    pub fn consume_code(&self, token: &str) -> TokenResult<Signed<CodeClaims>> {
        let signed = self.parse_validated::<CodeClaims>(token)?;
        self.codes
            .try_consume(token, signed.exp, Utc::now().timestamp())?;
        Ok(signed)
    }

    /// Publishes the JWK set.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when the x5c certificate cannot be minted.
    pub fn jwk_set(&self, hostname: &str) -> TokenResult<JsonWebKeySet> {
        JsonWebKeySet::for_key(&self.key, hostname)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use crate::claims::{AccessTokenClaims, LoginSessionClaims, SsoClaims};

    use super::*;

    const ISSUER: &str = "http://localhost:8000";

    fn manager() -> &'static TokenManager {
        static MANAGER: OnceLock<TokenManager> = OnceLock::new();
        MANAGER.get_or_init(|| TokenManager::new(ISSUER, SigningKey::generate().unwrap()))
    }

    fn hour() -> Duration {
        Duration::from_secs(3600)
    }

    #[test]
    fn mint_parse_round_trip() {
        let body = CodeClaims::new(
            "macrat",
            "some_client_id",
            "http://some-client.example.com/callback",
            "openid profile",
            1_700_000_000,
        )
        .with_nonce("this is nonce");

        let token = manager().mint(body.clone(), hour()).unwrap();
        let parsed = manager().parse::<CodeClaims>(&token).unwrap();

        assert_eq!(parsed.body, body);
        assert_eq!(parsed.iss, ISSUER);
        assert_eq!(parsed.typ, "CODE");
        assert_eq!(parsed.exp - parsed.iat, 3600);
        assert!(manager().validate(&parsed).is_ok());
    }

    #[test]
    fn round_trip_for_every_kind() {
        let m = manager();

        let access = AccessTokenClaims::new("macrat", "some_client_id", "openid", 0);
        let token = m.mint(access.clone(), hour()).unwrap();
        assert_eq!(m.parse::<AccessTokenClaims>(&token).unwrap().body, access);

        let sso = SsoClaims::new("macrat", 0, "some_client_id");
        let token = m.mint(sso.clone(), hour()).unwrap();
        assert_eq!(m.parse::<SsoClaims>(&token).unwrap().body, sso);

        let login = LoginSessionClaims::new("some_client_id", "::1");
        let token = m.mint(login.clone(), hour()).unwrap();
        assert_eq!(m.parse::<LoginSessionClaims>(&token).unwrap().body, login);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let sso = SsoClaims::new("macrat", 0, "some_client_id");
        let token = manager().mint(sso, hour()).unwrap();

        let err = manager().parse::<CodeClaims>(&token).unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongType {
                expected: TokenKind::Code,
                ..
            }
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let sso = SsoClaims::new("macrat", 0, "some_client_id");
        let token = manager().mint(sso, Duration::ZERO).unwrap();

        // exp == iat, and expiry is strict: now >= exp fails immediately
        assert!(matches!(
            manager().parse::<SsoClaims>(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn garbage_is_malformed_and_tampering_breaks_the_signature() {
        assert!(matches!(
            manager().parse::<SsoClaims>("definitely not a jwt"),
            Err(TokenError::Malformed(_))
        ));

        let token = manager()
            .mint(SsoClaims::new("macrat", 0, "some_client_id"), hour())
            .unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        // re-sign nothing: swap the payload for a different valid payload
        let other = manager()
            .mint(SsoClaims::new("intruder", 0, "some_client_id"), hour())
            .unwrap();
        parts[1] = other.split('.').nth(1).unwrap().to_string();
        let spliced = parts.join(".");

        assert!(matches!(
            manager().parse::<SsoClaims>(&spliced),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn validate_checks_issuer_and_iat_skew() {
        let now = Utc::now().timestamp();
        let mut signed = Signed {
            iss: "http://another-issuer.example.com".to_string(),
            iat: now,
            exp: now + 600,
            typ: "SSO".to_string(),
            body: SsoClaims::new("macrat", now, "some_client_id"),
        };
        assert!(matches!(
            manager().validate(&signed),
            Err(TokenError::WrongIssuer)
        ));

        signed.iss = ISSUER.to_string();
        signed.iat = now + CLOCK_SKEW + 5;
        assert!(matches!(
            manager().validate(&signed),
            Err(TokenError::IssuedInFuture)
        ));

        // within the skew window is fine
        signed.iat = now + CLOCK_SKEW - 5;
        assert!(manager().validate(&signed).is_ok());
    }

    #[test]
    fn code_is_single_use() {
        let code = manager()
            .mint(
                CodeClaims::new("macrat", "some_client_id", "http://cb", "openid", 0),
                hour(),
            )
            .unwrap();

        assert!(manager().consume_code(&code).is_ok());
        assert!(matches!(
            manager().consume_code(&code),
            Err(TokenError::AlreadyUsed)
        ));
    }

    #[test]
    fn concurrent_redemption_has_exactly_one_winner() {
        // local manager so other tests' codes don't share the store
        let m = Arc::new(TokenManager::new(ISSUER, SigningKey::generate().unwrap()));
        let code = m
            .mint(
                CodeClaims::new("macrat", "some_client_id", "http://cb", "openid", 0),
                hour(),
            )
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let m = Arc::clone(&m);
                let code = code.clone();
                std::thread::spawn(move || m.consume_code(&code).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn tokens_from_another_key_do_not_verify() {
        let stranger = TokenManager::new(ISSUER, SigningKey::generate().unwrap());
        let token = stranger
            .mint(SsoClaims::new("macrat", 0, "some_client_id"), hour())
            .unwrap();

        assert!(matches!(
            manager().parse::<SsoClaims>(&token),
            Err(TokenError::InvalidSignature)
        ));
    }
}
