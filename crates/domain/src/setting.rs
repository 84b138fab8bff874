use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type a [`Setting`]'s value is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Enum,
}

/// A single named, typed, overridable configuration knob exposed through the
/// settings registry. `env_key`, when present, is consulted between the
/// stored override and the compiled-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub group: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub default_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub sensitive: bool,
}

impl Setting {
    /// Validate a candidate value against this setting's type and bounds.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self.setting_type {
            SettingType::String => {
                if !value.is_string() {
                    return Err(format!("setting {} expects a string", self.key));
                }
            }
            SettingType::Number => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("setting {} expects a number", self.key))?;
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("setting {} below minimum {min}", self.key));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("setting {} above maximum {max}", self.key));
                    }
                }
            }
            SettingType::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("setting {} expects a boolean", self.key));
                }
            }
            SettingType::Enum => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("setting {} expects a string enum value", self.key))?;
                let allowed = self.enum_values.as_deref().unwrap_or_default();
                if !allowed.iter().any(|v| v == s) {
                    return Err(format!("setting {} value {s:?} is not a valid enum member", self.key));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number_setting() -> Setting {
        Setting {
            key: "routing.maxChainDepth".into(),
            group: "routing".into(),
            setting_type: SettingType::Number,
            default_value: json!(8),
            env_key: Some("AGENTIM_MAX_CHAIN_DEPTH".into()),
            enum_values: None,
            min: Some(1.0),
            max: Some(32.0),
            sensitive: false,
        }
    }

    #[test]
    fn number_out_of_range_rejected() {
        let s = number_setting();
        assert!(s.validate(&json!(0)).is_err());
        assert!(s.validate(&json!(100)).is_err());
        assert!(s.validate(&json!(8)).is_ok());
    }

    #[test]
    fn enum_rejects_unknown_member() {
        let s = Setting {
            key: "routing.defaultMode".into(),
            group: "routing".into(),
            setting_type: SettingType::Enum,
            default_value: json!("direct"),
            env_key: None,
            enum_values: Some(vec!["direct".into(), "broadcast".into(), "none".into()]),
            min: None,
            max: None,
            sensitive: false,
        };
        assert!(s.validate(&json!("direct")).is_ok());
        assert!(s.validate(&json!("sideways")).is_err());
    }
}
