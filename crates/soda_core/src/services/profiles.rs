//! Warehouse profiles stored in the user's home directory.
//!
//! The store is a YAML file keyed by profile name:
//!
//! ```yaml
//! my_project:
//!   target: dev
//!   outputs:
//!     dev:
//!       type: postgres
//!       host: localhost
//!       port: 5432
//!       username: soda
//!       database: soda
//!       schema: public
//! ```

use crate::models::{ParseLogs, WarehouseConfiguration};
use crate::services::file_system::FileSystem;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known location of the profiles store.
pub const USER_HOME_PROFILES_YAML_LOCATION: &str = "~/.soda/profiles.yml";

/// Value written into scaffolded profiles where credentials still have to be filled in.
pub const PLACEHOLDER_VALUE: &str = "***";

/// One profile entry in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Target used when none is requested
    #[serde(default)]
    pub target: Option<String>,
    /// Connection properties per target
    #[serde(default)]
    pub outputs: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

/// The whole profiles store, keyed by profile name.
pub type ProfilesFile = BTreeMap<String, ProfileEntry>;

/// A profile/target pair resolved from the store.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    target: String,
    properties: Option<WarehouseConfiguration>,
    parse_logs: ParseLogs,
    store_missing: bool,
}

impl Profile {
    /// Resolve `name`/`target` from the well-known store.
    ///
    /// An empty `target` selects the profile's default target.
    pub fn load(fs: &FileSystem, name: &str, target: &str) -> Self {
        Self::load_from(fs, USER_HOME_PROFILES_YAML_LOCATION, name, target)
    }

    /// Resolve `name`/`target` from a store at `location`.
    pub fn load_from(fs: &FileSystem, location: &str, name: &str, target: &str) -> Self {
        let mut profile = Self {
            name: name.to_string(),
            target: target.to_string(),
            properties: None,
            parse_logs: ParseLogs::new(),
            store_missing: false,
        };

        match fs.file_read_as_str(location) {
            Ok(content) => profile.parse(location, &content),
            Err(err) => {
                profile.store_missing = err.is_not_found();
                profile.parse_logs.error(format!("Couldn't read {location}: {err}"));
            }
        }

        tracing::debug!(
            profile = %profile.name,
            target = %profile.target,
            resolved = profile.properties.is_some(),
            "Profile loaded"
        );
        profile
    }

    fn parse(&mut self, location: &str, content: &str) {
        let profiles = match serde_yaml::from_str::<Option<ProfilesFile>>(content) {
            Ok(Some(profiles)) => profiles,
            Ok(None) => ProfilesFile::new(),
            Err(err) => {
                self.parse_logs.error(format!("Invalid YAML in {location}: {err}"));
                return;
            }
        };

        let Some(entry) = profiles.get(&self.name) else {
            self.parse_logs.error(format!("Profile '{}' not found in {location}", self.name));
            return;
        };

        if self.target.is_empty() {
            match &entry.target {
                Some(default_target) => self.target = default_target.clone(),
                None => {
                    self.parse_logs.error(format!(
                        "No target requested and profile '{}' has no default target",
                        self.name
                    ));
                    return;
                }
            }
        }

        let Some(output) = entry.outputs.get(&self.target) else {
            self.parse_logs.error(format!(
                "Target '{}' not found in profile '{}' in {location}",
                self.target, self.name
            ));
            return;
        };

        let mut properties = WarehouseConfiguration::new();
        for (key, value) in output {
            match scalar_to_string(value) {
                Some(text) if text == PLACEHOLDER_VALUE => {
                    self.parse_logs.error(format!(
                        "{key} for profile '{}', target '{}' still has placeholder value '{PLACEHOLDER_VALUE}'",
                        self.name, self.target
                    ));
                }
                Some(text) => properties = properties.with(key.clone(), text),
                None => self.parse_logs.warning(format!(
                    "{key} for profile '{}', target '{}' is not a scalar value and was ignored",
                    self.name, self.target
                )),
            }
        }

        if properties.warehouse_type().is_none() {
            self.parse_logs.error(format!(
                "type is required for profile '{}', target '{}'",
                self.name, self.target
            ));
        }

        self.properties = Some(properties);
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target name; the profile's default target once resolved.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolved connection properties, if the target was found.
    pub fn properties(&self) -> Option<&WarehouseConfiguration> {
        self.properties.as_ref()
    }

    /// Diagnostics produced while loading.
    pub fn parse_logs(&self) -> &ParseLogs {
        &self.parse_logs
    }

    /// Whether the store file does not exist.
    pub fn is_store_missing(&self) -> bool {
        self.store_missing
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
