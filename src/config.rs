//! Configuration for the transformation engine.

use crate::error::{Error, Result};

/// How relations treat lower-order entries missing from a supplied map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubstitutionPolicy {
    /// Leave the missing entry as its default symbol (`m_1_0`, `c_2_0`, ...).
    #[default]
    Lenient,
    /// Fail with [`Error::IncompleteSubstitution`].
    Strict,
}

/// Symbol naming and evaluation policy of a [`CumulantEngine`](crate::CumulantEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Prefix of default raw-moment symbols, e.g. `m` for `m_2_0`.
    pub raw_moment_prefix: String,
    /// Prefix of default central-moment symbols.
    pub central_moment_prefix: String,
    /// Prefix of default cumulant symbols, e.g. `c` for `c_1_1`.
    pub cumulant_prefix: String,
    /// Prefix of default distribution symbols, e.g. `f` for `f_3`.
    pub distribution_prefix: String,
    /// Handling of missing entries in supplied moment/cumulant maps.
    pub substitution: SubstitutionPolicy,
    /// Memoize derived expressions across calls.
    pub caching: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            raw_moment_prefix: "m".to_string(),
            central_moment_prefix: "m".to_string(),
            cumulant_prefix: "c".to_string(),
            distribution_prefix: "f".to_string(),
            substitution: SubstitutionPolicy::Lenient,
            caching: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw-moment symbol prefix.
    pub fn with_raw_moment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.raw_moment_prefix = prefix.into();
        self
    }

    /// Sets the central-moment symbol prefix.
    pub fn with_central_moment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.central_moment_prefix = prefix.into();
        self
    }

    /// Sets the cumulant symbol prefix.
    pub fn with_cumulant_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cumulant_prefix = prefix.into();
        self
    }

    /// Sets the distribution symbol prefix.
    pub fn with_distribution_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.distribution_prefix = prefix.into();
        self
    }

    /// Sets the substitution policy.
    pub fn with_substitution(mut self, policy: SubstitutionPolicy) -> Self {
        self.substitution = policy;
        self
    }

    /// Enables or disables memoization.
    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if a prefix is empty or contains
    /// characters other than ASCII alphanumerics and `_`, or if the cumulant
    /// prefix collides with a moment prefix.
    pub fn validate(&self) -> Result<()> {
        let prefixes = [
            ("raw_moment_prefix", &self.raw_moment_prefix),
            ("central_moment_prefix", &self.central_moment_prefix),
            ("cumulant_prefix", &self.cumulant_prefix),
            ("distribution_prefix", &self.distribution_prefix),
        ];
        for (field, prefix) in prefixes {
            if prefix.is_empty() {
                return Err(Error::InvalidConfig(format!("{field} must not be empty")));
            }
            if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::InvalidConfig(format!(
                    "{field} must be alphanumeric, got {prefix:?}"
                )));
            }
        }
        if self.cumulant_prefix == self.raw_moment_prefix
            || self.cumulant_prefix == self.central_moment_prefix
        {
            return Err(Error::InvalidConfig(format!(
                "cumulant_prefix {:?} collides with a moment prefix",
                self.cumulant_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.substitution, SubstitutionPolicy::Lenient);
        assert!(config.caching);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = EngineConfig::new()
            .with_raw_moment_prefix("M")
            .with_cumulant_prefix("K")
            .with_substitution(SubstitutionPolicy::Strict)
            .with_caching(false);
        assert_eq!(config.raw_moment_prefix, "M");
        assert_eq!(config.cumulant_prefix, "K");
        assert_eq!(config.substitution, SubstitutionPolicy::Strict);
        assert!(!config.caching);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = EngineConfig::new().with_distribution_prefix("");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_non_identifier_prefix_rejected() {
        let config = EngineConfig::new().with_raw_moment_prefix("m-1");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_colliding_prefixes_rejected() {
        let config = EngineConfig::new().with_cumulant_prefix("m");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
