use serde::{de::Deserializer, Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::ConfigError;

pub const DEFAULT_BACKUP_RETENTION: usize = 5;

/// Operator preferences persisted between CLI sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Overrides the data directory; otherwise `ESTATE_HOME` or `~/.estate`.
    pub data_root: Option<PathBuf>,
}

/// Session and invitation policy applied by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub token_ttl_minutes: i64,
    pub invite_ttl_hours: i64,
    pub invite_base_url: String,
    pub require_device_approval: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            invite_ttl_hours: 72,
            invite_base_url: "http://localhost:8080".into(),
            require_device_approval: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: "USD".into(),
            theme: Theme::default(),
            default_workspace: None,
            auth: AuthSettings::default(),
            backup_retention: Self::default_backup_retention(),
            data_root: None,
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 9] = [
        "locale",
        "currency",
        "theme",
        "default_workspace",
        "backup_retention",
        "auth.token_ttl_minutes",
        "auth.invite_ttl_hours",
        "auth.invite_base_url",
        "auth.require_device_approval",
    ];

    pub fn default_backup_retention() -> usize {
        DEFAULT_BACKUP_RETENTION
    }

    /// Re-applies every key through [`Config::set`], so a hand-edited file is
    /// held to the same rules as the `config set` command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut probe = self.clone();
        for key in Self::KEYS {
            let value = self.get(key)?;
            probe.set(key, &value)?;
        }
        Ok(())
    }

    /// Current value of a dotted key, rendered for display.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "locale" => self.locale.clone(),
            "currency" => self.currency.clone(),
            "theme" => self.theme.to_string(),
            "default_workspace" => self.default_workspace.clone().unwrap_or_default(),
            "backup_retention" => self.backup_retention.to_string(),
            "auth.token_ttl_minutes" => self.auth.token_ttl_minutes.to_string(),
            "auth.invite_ttl_hours" => self.auth.invite_ttl_hours.to_string(),
            "auth.invite_base_url" => self.auth.invite_base_url.clone(),
            "auth.require_device_approval" => self.auth.require_device_approval.to_string(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "locale" => self.locale = non_empty(key, value)?,
            "currency" => {
                let code = non_empty(key, value)?.to_ascii_uppercase();
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(invalid(key, "expected a three-letter currency code"));
                }
                self.currency = code;
            }
            "theme" => self.theme = value.parse()?,
            "default_workspace" => {
                self.default_workspace = (!value.is_empty()).then(|| value.to_string())
            }
            "backup_retention" => {
                let retention: usize = parse_number(key, value)?;
                if retention == 0 {
                    return Err(invalid(key, "must keep at least one backup"));
                }
                self.backup_retention = retention;
            }
            "auth.token_ttl_minutes" => self.auth.token_ttl_minutes = positive(key, value)?,
            "auth.invite_ttl_hours" => self.auth.invite_ttl_hours = positive(key, value)?,
            "auth.invite_base_url" => {
                let url = non_empty(key, value)?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(invalid(key, "expected an http(s) URL"));
                }
                self.auth.invite_base_url = url.trim_end_matches('/').to_string();
            }
            "auth.require_device_approval" => {
                self.auth.require_device_approval = match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    _ => return Err(invalid(key, "expected true or false")),
                }
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        Err(invalid(key, "must not be empty"))
    } else {
        Ok(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, "expected a number"))
}

fn positive(key: &str, value: &str) -> Result<i64, ConfigError> {
    let number: i64 = parse_number(key, value)?;
    if number <= 0 {
        return Err(invalid(key, "must be positive"));
    }
    Ok(number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Plain,
    #[default]
    Color,
}

impl Theme {
    pub fn uses_color(self) -> bool {
        matches!(self, Theme::Color)
    }
}

impl std::str::FromStr for Theme {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Theme::Plain),
            "color" | "colour" => Ok(Theme::Color),
            _ => Err(invalid("theme", "expected plain or color")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Plain => "plain",
            Theme::Color => "color",
        })
    }
}

// Unknown or missing themes fall back to the default instead of failing the load.
impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_validates_and_normalises_values() {
        let mut cfg = Config::default();
        cfg.set("currency", "eur").unwrap();
        assert_eq!(cfg.currency, "EUR");
        cfg.set("auth.invite_base_url", "https://erp.example.com/").unwrap();
        assert_eq!(cfg.get("auth.invite_base_url").unwrap(), "https://erp.example.com");
        assert!(cfg.set("backup_retention", "0").is_err());
        assert!(cfg.set("auth.token_ttl_minutes", "-5").is_err());
        assert!(matches!(cfg.set("colour", "x"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn every_key_is_readable() {
        let cfg = Config::default();
        for key in Config::KEYS {
            assert!(cfg.get(key).is_ok(), "{key}");
        }
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let cfg: Config =
            serde_json::from_str(r#"{"locale":"pt-PT","currency":"EUR","theme":"neon"}"#).unwrap();
        assert_eq!(cfg.theme, Theme::Color);
        assert_eq!(cfg.backup_retention, DEFAULT_BACKUP_RETENTION);
        assert!(cfg.auth.require_device_approval);
    }
}
