use serde::{Deserialize, Deserializer, Serialize};

use super::repo::Moderator;
use crate::orders::dto::ChartData;

/// Request body for the back-office login.
#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after a successful admin login.
#[derive(Debug, Serialize)]
pub struct AdminAuthResponse {
    pub token: String,
    pub role: &'static str,
    pub user: Moderator,
}

#[derive(Debug, Deserialize)]
pub struct CreateModeratorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateModeratorRequest {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub organization_name: String,
    pub inn: String,
}

/// Bid update. `external_ref` distinguishes "leave as is" (field absent)
/// from "clear" (explicit null) from "set" (string value).
#[derive(Debug, Deserialize)]
pub struct UpdateBidRequest {
    pub status: String,
    #[serde(default, deserialize_with = "double_option")]
    pub external_ref: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub users_count: i64,
    pub bids_count: i64,
    pub chart_data: ChartData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_update_distinguishes_absent_null_and_set_external_ref() {
        let absent: UpdateBidRequest =
            serde_json::from_str(r#"{"status": "confirmed"}"#).unwrap();
        assert_eq!(absent.external_ref, None);

        let cleared: UpdateBidRequest =
            serde_json::from_str(r#"{"status": "confirmed", "external_ref": null}"#).unwrap();
        assert_eq!(cleared.external_ref, Some(None));

        let set: UpdateBidRequest =
            serde_json::from_str(r#"{"status": "confirmed", "external_ref": "1C-42"}"#).unwrap();
        assert_eq!(set.external_ref, Some(Some("1C-42".into())));
    }
}
