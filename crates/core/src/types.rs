//! Campaign data model — campaigns, placements, checkpoints and customers as
//! served by the remote campaign API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Backend environment a campaign is published to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Styling hints a placement declares for its rendering surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenProps {
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
}

/// A screen/flow within a campaign (a "campaign page").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub path: String,
    pub id: String,
    /// Stable public identifier; preferred over `id` for lookups.
    #[serde(default)]
    pub placement_id: Option<String>,
    #[serde(default)]
    pub is_empty: Option<bool>,
    #[serde(default)]
    pub screen_props: Option<ScreenProps>,
}

impl Placement {
    pub fn background_color(&self) -> Option<&str> {
        self.screen_props
            .as_ref()
            .and_then(|p| p.background_color.as_deref())
    }

    /// Identifier used when addressing the placement in URLs.
    pub fn public_id(&self) -> &str {
        self.placement_id.as_deref().unwrap_or(&self.id)
    }
}

/// A live marketing/referral campaign with its ordered placements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub environment: Environment,
    pub is_live: bool,
    #[serde(default)]
    pub campaign_pages: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointTrigger {
    Placement,
    Reward,
}

/// A named trigger point in host code, optionally mapped to a placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub campaign_id: String,
    pub checkpoint_name: String,
    pub trigger: CheckpointTrigger,
    #[serde(default)]
    pub placement_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Placement this checkpoint opens, ignoring blank identifiers.
    pub fn target_placement(&self) -> Option<&str> {
        self.placement_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Envelope returned by the checkpoint list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointsResponse {
    pub data: Vec<Checkpoint>,
}

/// Scalar value allowed in a customer's custom properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
    Null,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for PropertyValue {
    // Non-finite floats have no JSON representation.
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or(Self::Null)
    }
}

pub type CustomProperties = HashMap<String, PropertyValue>;

/// The identified end-user bound to the current session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub external_user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub custom_properties: Option<CustomProperties>,
}

/// Body of the identify call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub external_user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<CustomProperties>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_wire_shape() {
        let json = r##"{
            "id": "c1",
            "name": "Spring referrals",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-02T10:00:00Z",
            "environment": "test",
            "isLive": true,
            "campaignPages": [
                {"path": "/invite", "id": "p1", "placementId": "referrer",
                 "isEmpty": false, "screenProps": {"backgroundColor": "#FFFFFF"}},
                {"path": "/legacy", "id": "p2"}
            ]
        }"##;
        let campaign: Campaign = serde_json::from_str(json).unwrap();
        assert_eq!(campaign.environment, Environment::Test);
        assert_eq!(campaign.campaign_pages.len(), 2);
        assert_eq!(campaign.campaign_pages[0].background_color(), Some("#FFFFFF"));
        assert_eq!(campaign.campaign_pages[1].placement_id, None);
        assert_eq!(campaign.campaign_pages[1].public_id(), "p2");
    }

    #[test]
    fn test_checkpoint_without_placement() {
        let json = r#"{"data": [{
            "id": "cp1", "campaignId": "c1", "checkpointName": "purchase",
            "trigger": "reward", "placementId": "",
            "createdAt": "2024-03-01T10:00:00Z", "updatedAt": "2024-03-01T10:00:00Z"
        }]}"#;
        let resp: CheckpointsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data[0].trigger, CheckpointTrigger::Reward);
        assert_eq!(resp.data[0].target_placement(), None);
    }

    #[test]
    fn test_identify_request_custom_properties() {
        let mut props = CustomProperties::new();
        props.insert("plan".into(), "pro".into());
        props.insert("seats".into(), 5i64.into());
        props.insert("trial".into(), true.into());
        props.insert("referrer".into(), PropertyValue::Null);

        let req = IdentifyRequest {
            external_user_id: "user_1".into(),
            email: "a@b.com".into(),
            name: "A".into(),
            custom_properties: Some(props),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["externalUserId"], "user_1");
        assert_eq!(value["customProperties"]["seats"], 5);
        assert_eq!(value["customProperties"]["trial"], true);
        assert!(value["customProperties"]["referrer"].is_null());

        let parsed: IdentifyRequest = serde_json::from_value(value).unwrap();
        let parsed_props = parsed.custom_properties.unwrap();
        assert_eq!(parsed_props["plan"], PropertyValue::String("pro".into()));
        assert_eq!(parsed_props["referrer"], PropertyValue::Null);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(Environment::Test.to_string(), "test");
        assert!("staging".parse::<Environment>().is_err());
    }
}
