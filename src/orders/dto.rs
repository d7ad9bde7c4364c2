use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of request a client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Armature,
    Transport,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Armature => "armature",
            OrderType::Transport => "transport",
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "armature" => Ok(OrderType::Armature),
            "transport" => Ok(OrderType::Transport),
            other => Err(format!("unknown order type: {other}")),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status of an order. Any status may be written by an admin
/// update; no transition graph is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    #[serde(rename = "sent_to_1c")]
    SentTo1c,
    Processing,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::SentTo1c => "sent_to_1c",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "sent_to_1c" => Ok(OrderStatus::SentTo1c),
            "processing" => Ok(OrderStatus::Processing),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for submitting an order.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "type")]
    pub order_type: String,
    pub details: serde_json::Value,
    pub comment: Option<String>,
}

/// Per-day chart for the dashboard.
#[derive(Debug, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub data: Vec<i64>,
}

/// Client order dashboard counters.
#[derive(Debug, Serialize)]
pub struct OrderStats {
    pub total: i64,
    pub processing: i64,
    pub completed: i64,
    pub chart: ChartData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::New,
            OrderStatus::SentTo1c,
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn sent_to_1c_spelling_is_stable() {
        assert_eq!(OrderStatus::SentTo1c.as_str(), "sent_to_1c");
        let json = serde_json::to_string(&OrderStatus::SentTo1c).unwrap();
        assert_eq!(json, r#""sent_to_1c""#);
    }

    #[test]
    fn type_strings_round_trip() {
        assert_eq!("armature".parse::<OrderType>().unwrap(), OrderType::Armature);
        assert_eq!(
            "transport".parse::<OrderType>().unwrap(),
            OrderType::Transport
        );
        assert!("concrete".parse::<OrderType>().is_err());
    }
}
