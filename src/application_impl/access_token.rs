use crate::application_port::{AuthError, SecretKey};
use crate::domain_model::{AccessToken, IdentityId};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The only claims an access token may carry. Tokens with extra or missing
/// fields fail to decode.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccessClaims {
    sub: String, // identity id
    exp: i64,
}

/// Sign an HS256 access token for `subject` expiring `lifetime` from now.
pub fn mint_access_token(
    subject: &IdentityId,
    secret: &SecretKey,
    lifetime: Duration,
) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
    let lifetime =
        TimeDelta::from_std(lifetime).map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
    let exp_dt = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or_else(|| AuthError::TokenGeneration("expiry out of range".to_string()))?;
    let claims = AccessClaims {
        sub: subject.0.clone(),
        exp: exp_dt.timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
    Ok((AccessToken(token), exp_dt))
}

/// Check signature, expiry and claim shape, returning the subject.
pub fn verify_access_token(token: &str, secret: &SecretKey) -> Result<IdentityId, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    v.leeway = 0;
    v.set_required_spec_claims(&["exp", "sub"]);
    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &v)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })?;
    if data.claims.sub.is_empty() {
        return Err(AuthError::TokenInvalid("empty subject".to_string()));
    }
    Ok(IdentityId(data.claims.sub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret() -> SecretKey {
        SecretKey::new("test_secret_key")
    }

    fn sign(claims: &serde_json::Value, secret: &SecretKey) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_mint_and_verify_round_trip() {
        let id = IdentityId("42".to_string());
        let (token, exp) = mint_access_token(&id, &secret(), Duration::from_secs(300)).unwrap();

        assert_eq!(verify_access_token(token.as_str(), &secret()).unwrap(), id);

        let expires_in = exp.timestamp() - Utc::now().timestamp();
        assert!(expires_in > 290);
        assert!(expires_in <= 300);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let id = IdentityId("42".to_string());
        let (token, _) = mint_access_token(&id, &secret(), Duration::from_secs(300)).unwrap();

        let result = verify_access_token(token.as_str(), &SecretKey::new("other"));
        assert!(matches!(result, Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = Utc::now().timestamp() - 60;
        let token = sign(&json!({ "sub": "42", "exp": exp }), &secret());

        let result = verify_access_token(&token, &secret());
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_extra_claim_rejected() {
        let exp = Utc::now().timestamp() + 300;
        let token = sign(
            &json!({ "sub": "42", "exp": exp, "admin": true }),
            &secret(),
        );

        assert!(verify_access_token(&token, &secret()).is_err());
    }

    #[test]
    fn test_missing_subject_rejected() {
        let exp = Utc::now().timestamp() + 300;
        let token = sign(&json!({ "exp": exp }), &secret());

        assert!(verify_access_token(&token, &secret()).is_err());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let id = IdentityId("42".to_string());
        let (token, _) = mint_access_token(&id, &secret(), Duration::from_secs(300)).unwrap();
        let (head, signature) = token.as_str().rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let swapped = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}{}", head, swapped, &signature[1..]);

        assert!(verify_access_token(&tampered, &secret()).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            verify_access_token("not-a-jwt", &secret()),
            Err(AuthError::TokenInvalid(_))
        ));
    }
}
