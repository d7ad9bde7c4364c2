use serde::{Deserialize, Deserializer, Serialize};

use super::repo::Account;

/// Request body for requesting an SMS code.
#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub phone: String,
}

/// Request body for the OTP login. Clients have historically sent the code
/// both as a JSON string and as a number; accept either.
#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub phone: String,
    #[serde(deserialize_with = "string_or_number")]
    pub code: String,
}

/// Request body for the legacy find-or-create login.
#[derive(Debug, Deserialize)]
pub struct ImplicitLoginRequest {
    pub phone: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: Account,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_accepts_string_and_number() {
        let from_string: VerifyCodeRequest =
            serde_json::from_str(r#"{"phone": "+79123456789", "code": "1234"}"#).unwrap();
        assert_eq!(from_string.code, "1234");

        let from_number: VerifyCodeRequest =
            serde_json::from_str(r#"{"phone": "+79123456789", "code": 1234}"#).unwrap();
        assert_eq!(from_number.code, "1234");
    }
}
