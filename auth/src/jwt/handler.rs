use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::claims::Identity;
use super::claims::ValidatedClaims;
use super::errors::JwtError;

/// Session token issuer and validator.
///
/// Signs with a single symmetric secret using HS256. The accepted algorithm is
/// pinned: validation inspects the token header before anything else and rejects
/// every other algorithm, including `none` and asymmetric schemes.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    has_secret: bool,
}

impl TokenService {
    /// Create a new token service with a secret key.
    ///
    /// # Arguments
    /// * `secret` - Process-wide signing secret, loaded once at startup
    ///
    /// # Returns
    /// TokenService instance configured with HS256 algorithm
    ///
    /// # Security Notes
    /// - The secret should be at least 256 bits (32 bytes) for HS256
    /// - An empty secret makes every issuance fail with `SigningFailed`
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            has_secret: !secret.is_empty(),
        }
    }

    /// Issue a session token for an identity, valid for 24 hours from now.
    ///
    /// # Errors
    /// * `SigningFailed` - Signer is misconfigured
    pub fn issue(&self, identity: Identity) -> Result<String, JwtError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a session token with an explicit issuance instant.
    ///
    /// # Arguments
    /// * `identity` - Identity fields to encode
    /// * `issued_at` - Value for `iat`; `exp` is 24 hours later
    ///
    /// # Returns
    /// Encoded token string
    ///
    /// # Errors
    /// * `SigningFailed` - Signer is misconfigured
    pub fn issue_at(&self, identity: Identity, issued_at: DateTime<Utc>) -> Result<String, JwtError> {
        self.sign(&Claims::for_identity(identity, issued_at))
    }

    /// Validate a token against the current wall clock.
    ///
    /// # Errors
    /// * `Malformed` - Undecodable token, missing claims, or unexpected algorithm
    /// * `InvalidSignature` - Signature does not verify under the configured secret
    /// * `Expired` - Current time is past `exp`
    pub fn validate(&self, token: &str) -> Result<ValidatedClaims, JwtError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as of `now`.
    ///
    /// Checks run in a fixed order: header and algorithm, then signature, then
    /// expiry. Expiry is only meaningful once the signature is known to be good.
    ///
    /// # Arguments
    /// * `token` - Encoded token string
    /// * `now` - Instant to evaluate expiry against
    ///
    /// # Returns
    /// Validated claim set
    ///
    /// # Errors
    /// * `Malformed` - Undecodable token, missing claims, or unexpected algorithm
    /// * `InvalidSignature` - Signature does not verify under the configured secret
    /// * `Expired` - `now` is past `exp`
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<ValidatedClaims, JwtError> {
        let header = decode_header(token).map_err(|e| JwtError::Malformed(e.to_string()))?;

        if header.alg != self.algorithm {
            return Err(JwtError::Malformed(format!(
                "unexpected signing algorithm: {:?}",
                header.alg
            )));
        }

        // No signature can be trusted under an empty key.
        if !self.has_secret {
            return Err(JwtError::InvalidSignature);
        }

        let mut validation = Validation::new(self.algorithm);
        // Expiry is evaluated below against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    _ => JwtError::Malformed(e.to_string()),
                }
            })?;

        if token_data.claims.is_expired(now.timestamp()) {
            return Err(JwtError::Expired);
        }

        Ok(ValidatedClaims::new(token_data.claims))
    }

    /// Re-issue a token for already validated claims with a fresh 24 hour window.
    ///
    /// # Errors
    /// * `SigningFailed` - Signer is misconfigured
    pub fn refresh(&self, claims: &ValidatedClaims) -> Result<String, JwtError> {
        self.refresh_at(claims, Utc::now())
    }

    /// Re-issue a token for validated claims as of `now`.
    ///
    /// Identity fields are carried over unchanged; `iat` and `exp` are recomputed.
    pub fn refresh_at(
        &self,
        claims: &ValidatedClaims,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        self.issue_at(claims.identity(), now)
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        if !self.has_secret {
            return Err(JwtError::SigningFailed("signing secret is empty".to_string()));
        }

        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| JwtError::SigningFailed(e.to_string()))
    }
}
