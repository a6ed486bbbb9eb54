use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Str,
    Number,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Str => "str",
            SettingType::Number => "number",
            SettingType::Json => "json",
        }
    }

    /// Check that `value` is well-formed for this type.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            SettingType::Str => Ok(()),
            SettingType::Number => value
                .trim()
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| format!("'{}' is not a number", value)),
            SettingType::Json => serde_json::from_str::<serde_json::Value>(value)
                .map(|_| ())
                .map_err(|e| format!("invalid JSON: {}", e)),
        }
    }
}

impl FromStr for SettingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" => Ok(SettingType::Str),
            "number" => Ok(SettingType::Number),
            "json" => Ok(SettingType::Json),
            _ => Err(anyhow::anyhow!("Invalid setting type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
    pub value_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertSettingRequest {
    #[validate(length(min = 1, max = 100, message = "Key must be between 1 and 100 characters"))]
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default = "default_setting_type")]
    pub value_type: SettingType,
}

fn default_setting_type() -> SettingType {
    SettingType::Str
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchUpsertSettingsRequest {
    #[validate(length(min = 1, message = "At least one setting is required"), nested)]
    pub settings: Vec<UpsertSettingRequest>,
}
