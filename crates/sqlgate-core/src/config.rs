//! TOML configuration
//!
//! ```toml
//! [translate]
//! week_start = "sunday"
//!
//! [security]
//! metadata_ttl_secs = 30
//!
//! [security.policies.h2]
//! allow_schema_mutation = false
//! allow_unparseable = false
//!
//! [[drivers]]
//! id = "h2-legacy"
//! parent = "h2"
//! capabilities = { regex = true }
//! type_map = { "DECFLOAT" = "Decimal" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Weekday;

use crate::{
    Capability, DriverDescriptor, GateError, PolicySet, Result, SecurityPolicy, SemanticType,
    SessionOptions, TranslateOptions,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub translate: TranslateConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub drivers: Vec<DriverConfig>,
}

impl GateConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), drivers = config.drivers.len(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn translate_options(&self) -> Result<TranslateOptions> {
        let week_start = match &self.translate.week_start {
            Some(day) => day.parse::<Weekday>().map_err(|_| {
                GateError::Configuration(format!("invalid week_start '{}'", day))
            })?,
            None => Weekday::Mon,
        };
        Ok(TranslateOptions { week_start })
    }

    pub fn policy_set(&self) -> PolicySet {
        self.security
            .policies
            .iter()
            .fold(PolicySet::new(self.security.default_policy), |set, (id, policy)| {
                set.with_policy(id.clone(), *policy)
            })
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.security.metadata_ttl_secs)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_only: self.session.read_only,
            time_zone: self.session.time_zone.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Day name accepted by chrono, e.g. "monday" or "sun"
    pub week_start: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub metadata_ttl_secs: u64,
    /// Policy for drivers without an entry in `policies`
    pub default_policy: SecurityPolicy,
    pub policies: BTreeMap<String, SecurityPolicy>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: 60,
            default_policy: SecurityPolicy::default(),
            policies: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub read_only: bool,
    pub time_zone: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_only: true,
            time_zone: None,
        }
    }
}

/// A driver declared in configuration, inheriting from a registered one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub id: String,
    pub parent: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default)]
    pub type_map: BTreeMap<String, SemanticType>,
    #[serde(default)]
    pub default_admin_user: Option<String>,
}

impl DriverConfig {
    pub fn to_descriptor(&self) -> Result<DriverDescriptor> {
        let mut descriptor = DriverDescriptor::new(self.id.clone()).parent(self.parent.clone());
        if let Some(name) = &self.display_name {
            descriptor = descriptor.display_name(name.clone());
        }
        for (name, enabled) in &self.capabilities {
            descriptor = descriptor.capability(name.parse::<Capability>()?, *enabled);
        }
        for (native, semantic) in &self.type_map {
            descriptor = descriptor.native_type(native, *semantic);
        }
        if let Some(user) = &self.default_admin_user {
            descriptor = descriptor.default_admin_user(user.clone());
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DriverRegistry, ROOT_DRIVER_ID, ansi_descriptor};
    use std::io::Write;

    const EXAMPLE: &str = r#"
[translate]
week_start = "sunday"

[security]
metadata_ttl_secs = 5

[security.policies.legacy]
allow_schema_mutation = true

[[drivers]]
id = "legacy"
parent = "sql"
display_name = "Legacy SQL"
capabilities = { regex = true, "actions/custom" = true }
type_map = { "DECFLOAT" = "Decimal" }
"#;

    #[test]
    fn test_parse_full_config() {
        let config = GateConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.translate_options().unwrap().week_start, Weekday::Sun);
        assert_eq!(config.metadata_ttl(), Duration::from_secs(5));
        assert!(config.session.read_only);
        assert_eq!(config.drivers.len(), 1);

        let mut registry = DriverRegistry::new(ansi_descriptor()).unwrap();
        registry
            .register(config.drivers[0].to_descriptor().unwrap())
            .unwrap();
        let legacy = registry.resolve("legacy").unwrap();
        assert_eq!(legacy.display_name(), "Legacy SQL");
        assert!(legacy.capability(Capability::Regex));
        assert!(legacy.capability(Capability::CustomActions));
        assert_eq!(legacy.semantic_type("decfloat"), SemanticType::Decimal);
        assert!(config.policy_set().policy_for(legacy).allow_schema_mutation);
        assert!(!config.policy_set().policy_for(registry.root()).allow_schema_mutation);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GateConfig::from_toml_str("").unwrap();
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.translate_options().unwrap(), TranslateOptions::default());
        assert_eq!(config.metadata_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let config = GateConfig::from_toml_str("[translate]\nweek_start = \"someday\"").unwrap();
        assert!(config.translate_options().unwrap_err().is_configuration());

        let config = GateConfig::from_toml_str(
            "[[drivers]]\nid = \"x\"\nparent = \"sql\"\ncapabilities = { teleport = true }",
        )
        .unwrap();
        assert!(config.drivers[0].to_descriptor().unwrap_err().is_configuration());

        let err = GateConfig::from_toml_str("[[drivers]]\nid = 3").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[drivers]]\nid = \"child\"\nparent = \"{}\"\n", ROOT_DRIVER_ID).unwrap();
        let config = GateConfig::load(file.path()).unwrap();
        assert_eq!(config.drivers[0].parent, ROOT_DRIVER_ID);

        let missing = GateConfig::load(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(missing, GateError::Io(_)));
    }
}
