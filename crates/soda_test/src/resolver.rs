//! Resolve the warehouse configuration a test run connects with.
//!
//! The reserved `test`/`local_postgres` pair maps to a built-in local
//! Postgres configuration and never touches the filesystem. Any other pair is
//! read from the profiles store; when the store is missing a scaffold is
//! written so an operator can fill in credentials.

use crate::error::HarnessError;
use crate::settings::{LOCAL_PROFILE, LOCAL_TARGET};

use soda_core::services::profiles::{ProfileEntry, ProfilesFile, PLACEHOLDER_VALUE};
use soda_core::{FileSystem, Profile, SodaError, WarehouseConfiguration, USER_HOME_PROFILES_YAML_LOCATION};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Target written into the scaffold.
const SCAFFOLD_TARGET: &str = "redshift";

/// Turns a (profile, target) pair into a warehouse configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    file_system: FileSystem,
    location: String,
}

impl Default for ConfigurationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationResolver {
    /// Resolver over the real home directory.
    pub fn new() -> Self {
        Self::with_file_system(FileSystem::new())
    }

    /// Resolver over a specific file system, e.g. one rooted in a temp dir.
    pub fn with_file_system(file_system: FileSystem) -> Self {
        Self { file_system, location: USER_HOME_PROFILES_YAML_LOCATION.to_string() }
    }

    /// Location of the profiles store, `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        self.file_system.expand_user(&self.location)
    }

    /// Resolve the configuration for `profile`/`target`.
    pub fn resolve(&self, profile: &str, target: &str) -> Result<WarehouseConfiguration, HarnessError> {
        if profile == LOCAL_PROFILE && target == LOCAL_TARGET {
            tracing::debug!(profile, target, "Using built-in local warehouse configuration");
            return Ok(local_configuration());
        }

        let loaded = Profile::load_from(&self.file_system, &self.location, profile, target);

        if loaded.is_store_missing() {
            let location = self.store_path();
            let scaffold_error = match self.write_scaffold() {
                Ok(()) => {
                    tracing::error!(
                        path = %location.display(),
                        profile,
                        target,
                        "{} not found. Default initial version was created. Update credentials and retry.",
                        location.display()
                    );
                    None
                }
                Err(err) => {
                    tracing::error!(
                        path = %location.display(),
                        profile,
                        target,
                        error = %err,
                        "{} not found and the default initial version couldn't be written",
                        location.display()
                    );
                    Some(err.to_string())
                }
            };
            return Err(HarnessError::ConfigurationMissing {
                location,
                profile: profile.to_string(),
                target: target.to_string(),
                scaffold_error,
            });
        }

        let invalid = |location: String, logs: Vec<String>| HarnessError::ConfigurationInvalid {
            location,
            profile: profile.to_string(),
            target: target.to_string(),
            logs,
        };

        loaded
            .parse_logs()
            .ensure_no_warnings_or_errors(&self.location)
            .map_err(|err| HarnessError::from_parse_logs(err, &invalid))?;
        let configuration = loaded
            .properties()
            .cloned()
            .ok_or_else(|| invalid(self.location.clone(), loaded.parse_logs().lines()))?;

        tracing::debug!(profile, target, configuration = %configuration, "Resolved warehouse configuration");
        Ok(configuration)
    }

    fn write_scaffold(&self) -> Result<(), SodaError> {
        let (dir, _) = self.file_system.split(&self.location);
        self.file_system.mkdirs(&dir)?;
        let content = serde_yaml::to_string(&initial_profiles())?;
        self.file_system.file_write_from_str(&self.location, &content)
    }
}

/// The built-in local Postgres configuration.
pub fn local_configuration() -> WarehouseConfiguration {
    WarehouseConfiguration::new()
        .with("name", "test_postgres_warehouse")
        .with("type", "postgres")
        .with("host", "localhost")
        .with("port", "5432")
        .with("username", "sodalite")
        .with("database", "sodalite")
        .with("schema", "public")
}

/// Scaffold written when the profiles store is missing.
pub fn initial_profiles() -> ProfilesFile {
    let text = |s: &str| serde_yaml::Value::String(s.to_string());
    let output: BTreeMap<String, serde_yaml::Value> = [
        ("type", text("redshift")),
        ("host", text(PLACEHOLDER_VALUE)),
        ("port", text("5439")),
        ("username", text(PLACEHOLDER_VALUE)),
        ("database", text(PLACEHOLDER_VALUE)),
        ("schema", text("public")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let entry = ProfileEntry {
        target: Some(SCAFFOLD_TARGET.to_string()),
        outputs: BTreeMap::from([(SCAFFOLD_TARGET.to_string(), output)]),
    };
    BTreeMap::from([(LOCAL_PROFILE.to_string(), entry)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolver_in(home: &std::path::Path) -> ConfigurationResolver {
        ConfigurationResolver::with_file_system(FileSystem::with_home(home))
    }

    #[test]
    fn test_local_default_touches_no_files() {
        let home = tempdir().unwrap();
        let resolver = resolver_in(home.path());

        let configuration = resolver.resolve("test", "local_postgres").unwrap();

        assert_eq!(configuration, local_configuration());
        assert_eq!(configuration.get("username"), Some("sodalite"));
        assert_eq!(configuration.schema(), Some("public"));
        assert!(!home.path().join(".soda").exists());
    }

    #[test]
    fn test_missing_store_writes_scaffold() {
        let home = tempdir().unwrap();
        let resolver = resolver_in(home.path());

        let err = resolver.resolve("my_project", "dev").unwrap_err();

        assert!(err.is_skip());
        let store = home.path().join(".soda").join("profiles.yml");
        assert!(store.is_file());
        match &err {
            HarnessError::ConfigurationMissing { location, profile, target, scaffold_error } => {
                assert_eq!(location, &store);
                assert_eq!(profile, "my_project");
                assert_eq!(target, "dev");
                assert_eq!(scaffold_error, &None);
            }
            other => panic!("unexpected error: {other}"),
        }

        let written: ProfilesFile =
            serde_yaml::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
        assert_eq!(written, initial_profiles());
        assert_eq!(written["test"].target.as_deref(), Some("redshift"));
    }

    #[test]
    fn test_second_resolution_after_scaffold_is_invalid() {
        let home = tempdir().unwrap();
        let resolver = resolver_in(home.path());
        let store = home.path().join(".soda").join("profiles.yml");

        assert!(resolver.resolve("my_project", "dev").unwrap_err().is_skip());
        let scaffold = std::fs::read_to_string(&store).unwrap();

        let err = resolver.resolve("my_project", "dev").unwrap_err();
        assert!(matches!(err, HarnessError::ConfigurationInvalid { .. }), "{err}");

        let err = resolver.resolve("test", "redshift").unwrap_err();
        match err {
            HarnessError::ConfigurationInvalid { logs, .. } => {
                assert!(logs.iter().any(|l| l.contains("placeholder")), "{logs:?}");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(std::fs::read_to_string(&store).unwrap(), scaffold);
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_scaffold_is_reported() {
        let home = tempdir().unwrap();
        let soda_dir = home.path().join(".soda");
        std::fs::create_dir_all(&soda_dir).unwrap();
        // Reads as missing, but writing through the link fails.
        std::os::unix::fs::symlink(home.path().join("gone").join("profiles.yml"), soda_dir.join("profiles.yml"))
            .unwrap();
        let resolver = resolver_in(home.path());

        let err = resolver.resolve("my_project", "dev").unwrap_err();

        assert!(err.is_skip());
        match &err {
            HarnessError::ConfigurationMissing { scaffold_error, .. } => assert!(scaffold_error.is_some()),
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(!message.contains("was created"), "{message}");
        assert!(message.contains("couldn't be written"), "{message}");
    }

    #[test]
    fn test_resolves_configured_target() {
        let home = tempdir().unwrap();
        let soda_dir = home.path().join(".soda");
        std::fs::create_dir_all(&soda_dir).unwrap();
        std::fs::write(
            soda_dir.join("profiles.yml"),
            "my_project:\n  target: dev\n  outputs:\n    dev:\n      type: postgres\n      host: db.internal\n      port: 6543\n      username: scanner\n      password: secret\n      database: analytics\n      schema: staging\n",
        )
        .unwrap();

        let configuration = resolver_in(home.path()).resolve("my_project", "dev").unwrap();

        assert_eq!(configuration.host(), Some("db.internal"));
        assert_eq!(configuration.port(), Ok(6543));
        assert_eq!(configuration.password(), Some("secret"));
        assert!(!configuration.to_string().contains("secret"));
    }

    #[test]
    fn test_unknown_target_is_invalid() {
        let home = tempdir().unwrap();
        let soda_dir = home.path().join(".soda");
        std::fs::create_dir_all(&soda_dir).unwrap();
        std::fs::write(
            soda_dir.join("profiles.yml"),
            "my_project:\n  outputs:\n    dev:\n      type: postgres\n      host: localhost\n",
        )
        .unwrap();

        let err = resolver_in(home.path()).resolve("my_project", "prod").unwrap_err();
        assert!(!err.is_skip());
        assert!(err.to_string().contains("Target 'prod' not found"), "{err}");
    }
}
