//! Configuration lookup for the reporting session.
//!
//! Reporting is configured through a handful of string keys (see [`keys`]).
//! The [`ConfigurationSource`] trait keeps the lookup mechanism pluggable:
//! the default [`EnvConfigurationSource`] reads process environment
//! variables, and [`MapConfigurationSource`] backs tests and embedders that
//! already hold their configuration in memory.

use std::collections::HashMap;
use std::env;

/// Names of the configuration entries the session controller consumes.
pub mod keys {
    /// The base url of slick. This should be the url you would visit with a
    /// browser; the `api/` suffix is appended automatically if missing.
    pub const BASE_URL: &str = "slick.baseurl";

    /// The name of the project to file results and tests under. It will be
    /// created if it does not exist.
    pub const PROJECT_NAME: &str = "slick.project";

    /// The name of the release to reference on the testrun and results.
    pub const RELEASE_NAME: &str = "slick.release";

    /// The name of the build to reference on the testrun and results.
    pub const BUILD_NAME: &str = "slick.build";

    /// The name of the testplan (if any) to use for the testrun. It will be
    /// created if necessary.
    pub const TESTPLAN_NAME: &str = "slick.testplan";

    /// The name of the testrun. If missing and there is a testplan, the
    /// testplan name is used. If both are missing a date-and-time derived
    /// name is used.
    pub const TESTRUN_NAME: &str = "slick.testrun";
}

/// A source of configuration entries for slick reporting.
///
/// Implementations must tolerate unknown keys by returning `None`.
pub trait ConfigurationSource: Send + Sync {
    /// Look up a configuration entry by its dotted key name.
    fn entry(&self, name: &str) -> Option<String>;

    /// Look up a configuration entry, falling back to `default`.
    fn entry_or(&self, name: &str, default: &str) -> String {
        self.entry(name).unwrap_or_else(|| default.to_string())
    }
}

/// Translate a dotted configuration key into its environment variable name.
///
/// `slick.baseurl` becomes `SLICK_BASEURL`.
pub fn env_name_for(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}

/// Configuration source backed by process environment variables.
///
/// Empty values are treated as unset, so `SLICK_BASEURL=""` disables
/// reporting the same way an absent variable does.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigurationSource;

impl EnvConfigurationSource {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigurationSource for EnvConfigurationSource {
    fn entry(&self, name: &str) -> Option<String> {
        env::var(env_name_for(name)).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory configuration source, primarily for tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MapConfigurationSource {
    values: HashMap<String, String>,
}

impl MapConfigurationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entry, replacing any previous value.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ConfigurationSource for MapConfigurationSource {
    fn entry(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned().filter(|v| !v.is_empty())
    }
}
