//! Token minting and validation (C16). HS256 only — any other
//! algorithm in a presented token is rejected outright.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    #[serde(flatten)]
    pub custom: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
    default_expiration: Duration,
}

const ONE_YEAR_SECS: i64 = 365 * 24 * 3600;

impl JwtService {
    pub fn new(secret: impl Into<String>, default_expiration_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            default_expiration: Duration::minutes(default_expiration_minutes),
        }
    }

    /// Standard user-session token: `sub` is the user id, `org_id` carries
    /// the effective tenant. Issuer is fixed to this service's name.
    pub fn issue_user_token(&self, user_id: Uuid, org_id: Uuid) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let exp = now + self.default_expiration;
        let claims = Claims {
            iss: "kyc-gateway".into(),
            sub: user_id.to_string(),
            aud: None,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            org_id: Some(org_id),
            custom: serde_json::Map::new(),
        };
        self.sign(&claims, &self.secret)
    }

    /// OAuth2 client-credentials token, minted by this service after it
    /// has verified the client's secret against `OAuthClient`. Carries
    /// `token_kind=oauth_client` so the authn resolver can tell it apart
    /// from a user session token at decode time.
    pub fn issue_oauth_token(
        &self,
        client_id: Uuid,
        org_id: Uuid,
        scopes: &[String],
        ttl_secs: i64,
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let mut custom = serde_json::Map::new();
        custom.insert("token_kind".into(), Value::String("oauth_client".into()));
        custom.insert("client_id".into(), Value::String(client_id.to_string()));
        custom.insert("scopes".into(), Value::Array(scopes.iter().cloned().map(Value::String).collect()));

        let claims = Claims {
            iss: "kyc-gateway".into(),
            sub: client_id.to_string(),
            aud: None,
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
            org_id: Some(org_id),
            custom,
        };
        self.sign(&claims, &self.secret)
    }

    /// The `/token/generate` test-aid endpoint: caller supplies issuer,
    /// subject, optional audience/custom claims and, when the override
    /// is enabled, their own secret — forging claims for that secret.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_test_token(
        &self,
        issuer: &str,
        subject: &str,
        audience: Option<&str>,
        expiration_secs: i64,
        custom_claims: Option<serde_json::Map<String, Value>>,
        algorithm: Option<&str>,
        secret_override: Option<&str>,
        allow_secret_override: bool,
    ) -> Result<IssuedToken, AppError> {
        let alg_label = algorithm.unwrap_or("HS256").to_string();
        let result = self.generate_test_token_inner(
            issuer,
            subject,
            audience,
            expiration_secs,
            custom_claims,
            algorithm,
            secret_override,
            allow_secret_override,
        );
        metrics::counter!(
            "token_generate_total",
            "issuer" => issuer.to_string(),
            "algorithm" => alg_label,
            "success" => result.is_ok().to_string(),
        )
        .increment(1);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_test_token_inner(
        &self,
        issuer: &str,
        subject: &str,
        audience: Option<&str>,
        expiration_secs: i64,
        custom_claims: Option<serde_json::Map<String, Value>>,
        algorithm: Option<&str>,
        secret_override: Option<&str>,
        allow_secret_override: bool,
    ) -> Result<IssuedToken, AppError> {
        if let Some(alg) = algorithm {
            if !alg.eq_ignore_ascii_case("HS256") {
                return Err(AppError::Validation("unsupported algorithm".into()));
            }
        }
        if expiration_secs <= 0 || expiration_secs > ONE_YEAR_SECS {
            return Err(AppError::Validation("expiration must be > 0 and <= 1 year".into()));
        }
        if issuer.is_empty() || subject.is_empty() {
            return Err(AppError::Validation("iss and sub are required".into()));
        }

        let secret = match secret_override {
            Some(s) if allow_secret_override => s.to_string(),
            Some(_) => return Err(AppError::Forbidden("secret override is disabled".into())),
            None => self.secret.clone(),
        };

        let now = Utc::now();
        let claims = Claims {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: audience.map(str::to_string),
            exp: (now + Duration::seconds(expiration_secs)).timestamp(),
            iat: now.timestamp(),
            org_id: None,
            custom: custom_claims.unwrap_or_default(),
        };
        self.sign(&claims, &secret)
    }

    fn sign(&self, claims: &Claims, secret: &str) -> Result<IssuedToken, AppError> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        let expires_in = claims.exp - claims.iat;
        Ok(IssuedToken {
            access_token: token,
            token_type: "Bearer",
            expires_in,
            refresh_token: Uuid::new_v4().to_string(),
        })
    }

    /// Decodes and validates a bearer token against the configured
    /// secret. Any algorithm other than HS256 fails at the library
    /// level because `Validation` pins the expected algorithm.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?;
        Ok(data.claims)
    }

    /// Decodes with a caller-supplied secret, used only for tokens
    /// minted via `generate_test_token`'s override path.
    pub fn decode_with_secret(&self, token: &str, secret: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_user_token() {
        let svc = JwtService::new("0123456789abcdef0123456789abcdef", 60);
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let issued = svc.issue_user_token(user_id, org_id).unwrap();
        let claims = svc.decode(&issued.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.org_id, Some(org_id));
    }

    #[test]
    fn rejects_non_hs256_algorithm_request() {
        let svc = JwtService::new("0123456789abcdef0123456789abcdef", 60);
        let err = svc
            .generate_test_token("issuer", "subject", None, 60, None, Some("RS256"), None, false)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_expiration_over_one_year() {
        let svc = JwtService::new("0123456789abcdef0123456789abcdef", 60);
        let err = svc
            .generate_test_token("issuer", "subject", None, ONE_YEAR_SECS + 1, None, None, None, false)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_secret_override_when_disabled() {
        let svc = JwtService::new("0123456789abcdef0123456789abcdef", 60);
        let err = svc
            .generate_test_token("issuer", "subject", None, 60, None, None, Some("forged"), false)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn rejects_token_whose_exp_equals_now() {
        let secret = "0123456789abcdef0123456789abcdef";
        let svc = JwtService::new(secret, 60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: "issuer".into(),
            sub: "subject".into(),
            aud: None,
            exp: now,
            iat: now,
            org_id: None,
            custom: serde_json::Map::new(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(svc.decode(&token).is_err());
    }

    #[test]
    fn honours_secret_override_when_enabled() {
        let svc = JwtService::new("0123456789abcdef0123456789abcdef", 60);
        let issued = svc
            .generate_test_token("issuer", "subject", None, 60, None, None, Some("forged-secret"), true)
            .unwrap();
        let claims = svc.decode_with_secret(&issued.access_token, "forged-secret").unwrap();
        assert_eq!(claims.sub, "subject");
    }
}
