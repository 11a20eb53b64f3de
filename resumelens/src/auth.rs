use crate::session::Role;
use crate::{Error, Result};
use serde_json::Value;

/// Decodes the claims (middle) segment of a JWT without verifying the signature.
///
/// Only used to read hints the server put there; the server remains the authority on whether a
/// token is any good.
pub fn parse_jwt_claims(jwt: &str) -> Result<Value> {
    let second_b64 = jwt
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Malformed("couldn't parse JWT".to_string()))?;
    let second_json: Vec<u8> =
        base64::decode_config(second_b64.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
            .map_err(|e| Error::Malformed(format!("JWT claims not base64: {e}")))?;
    let obj: Value = serde_json::from_slice(&second_json)?;
    if !obj.is_object() {
        return Err(Error::Malformed("JWT claims not an object".to_string()));
    }
    Ok(obj)
}

/// The backend puts the account role in an additional "role" claim of access tokens. Returns
/// `None` if the claim is absent.
pub fn parse_role_from_jwt(jwt: &str) -> Result<Option<Role>> {
    let claims = parse_jwt_claims(jwt)?;
    Ok(claims["role"].as_str().map(Role::from_stored))
}

/// Account identifier ("sub") of a token
pub fn parse_subject_from_jwt(jwt: &str) -> Result<String> {
    let claims = parse_jwt_claims(jwt)?;
    claims["sub"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Malformed("couldn't find subject in JWT".to_string()))
}

#[test]
fn test_parse_jwt() {
    assert!(parse_jwt_claims(".").is_err());
    assert!(parse_jwt_claims("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9").is_err());

    // access token with role claim
    let admin = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiI2NGYwYzBmZmVlMTIzNCIsInJvbGUiOiJhZG1pbiIsInR5cGUiOiJhY2Nlc3MifQ.c2ln";
    assert_eq!(parse_role_from_jwt(admin).unwrap(), Some(Role::Admin));
    assert_eq!(parse_subject_from_jwt(admin).unwrap(), "64f0c0ffee1234");

    // refresh token, no role claim
    let refresh = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiI2NGYwYzBmZmVlMTIzNCIsInR5cGUiOiJyZWZyZXNoIn0.c2ln";
    assert_eq!(parse_role_from_jwt(refresh).unwrap(), None);

    // no subject
    let anon = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJyb2xlIjoidXNlciJ9.c2ln";
    assert_eq!(parse_role_from_jwt(anon).unwrap(), Some(Role::User));
    assert!(parse_subject_from_jwt(anon).is_err());
}
