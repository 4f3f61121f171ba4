//! Harness settings from the environment.

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "SODA_TEST_PROFILE";

/// Environment variable selecting the target within the profile.
pub const TARGET_ENV: &str = "SODA_TEST_TARGET";

/// Reserved profile name of the built-in local warehouse.
pub const LOCAL_PROFILE: &str = "test";

/// Reserved target name of the built-in local warehouse.
pub const LOCAL_TARGET: &str = "local_postgres";

/// Which profile/target the tests run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    /// Profile name
    pub profile_name: String,
    /// Target name
    pub target_name: String,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self { profile_name: LOCAL_PROFILE.to_string(), target_name: LOCAL_TARGET.to_string() }
    }
}

impl HarnessSettings {
    /// Read settings from `SODA_TEST_PROFILE` and `SODA_TEST_TARGET`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self { profile_name: read(PROFILE_ENV, LOCAL_PROFILE), target_name: read(TARGET_ENV, LOCAL_TARGET) }
    }

    /// Create settings for an explicit profile/target.
    pub fn new(profile_name: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self { profile_name: profile_name.into(), target_name: target_name.into() }
    }

    /// Whether these settings select the built-in local warehouse.
    pub fn is_local_default(&self) -> bool {
        self.profile_name == LOCAL_PROFILE && self.target_name == LOCAL_TARGET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let settings = HarnessSettings::from_lookup(|_| None);
        assert_eq!(settings, HarnessSettings::default());
        assert!(settings.is_local_default());
    }

    #[test]
    fn test_reads_both_variables() {
        let env: HashMap<&str, &str> =
            [(PROFILE_ENV, "my_project"), (TARGET_ENV, "redshift")].into_iter().collect();
        let settings = HarnessSettings::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings, HarnessSettings::new("my_project", "redshift"));
        assert!(!settings.is_local_default());
    }

    #[test]
    fn test_blank_value_falls_back() {
        let settings = HarnessSettings::from_lookup(|key| {
            (key == TARGET_ENV).then(|| "  ".to_string())
        });
        assert_eq!(settings.target_name, LOCAL_TARGET);
    }
}
