//! Test plan configuration types
//!
//! Defines the structure for test plan files: default options plus a list of
//! protocol tests to run.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocols::{Arguments, Dispatcher, TestError, TestOptions, declaration};

/// Errors that can occur during configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid test #{index} ({input}): {source}")]
    Invalid {
        index: usize,
        input: String,
        #[source]
        source: TestError,
    },
}

/// Configuration for a single test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Registered protocol name (e.g., "tcp")
    pub protocol: String,

    /// Host name or address to test
    pub target: String,

    /// Protocol-specific arguments
    #[serde(
        default,
        deserialize_with = "scalar_arguments",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub arguments: Arguments,

    /// Timeout for this test, overriding the plan default
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl TestConfig {
    /// Create a test with no arguments
    pub fn new(protocol: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            target: target.into(),
            arguments: Arguments::new(),
            timeout: None,
        }
    }

    /// Add an argument
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Convert to TestOptions
    pub fn options(&self, defaults: &TestOptions) -> TestOptions {
        TestOptions {
            timeout: self.timeout.unwrap_or(defaults.timeout),
        }
    }

    /// Human-readable declaration, e.g. `host must run tcp with port 22`
    pub fn input(&self) -> String {
        declaration(&self.target, &self.protocol, &self.arguments)
    }
}

/// Accept numbers and booleans as argument values, so `port: 22` works
fn scalar_arguments<'de, D>(deserializer: D) -> Result<Arguments, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "argument '{name}' must be a scalar, got {other:?}"
                    )));
                }
            };
            Ok((name, value))
        })
        .collect()
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Options applied to every test unless overridden
    #[serde(default)]
    pub defaults: TestOptions,

    /// Tests to run, in order
    #[serde(default)]
    pub tests: Vec<TestConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Tests whose protocol is in `protocols`
    pub fn tests_for<'a>(
        &'a self,
        protocols: &'a [&str],
    ) -> impl Iterator<Item = &'a TestConfig> + 'a {
        self.tests
            .iter()
            .filter(move |t| protocols.iter().any(|p| *p == t.protocol))
    }

    /// Check every test names a known protocol with acceptable arguments,
    /// including every argument its protocol requires
    ///
    /// Nothing is run; this is the same schema check the dispatcher applies.
    pub fn validate(&self, dispatcher: &Dispatcher) -> Result<(), ConfigError> {
        for (index, test) in self.tests.iter().enumerate() {
            dispatcher
                .validate(&test.protocol, &test.arguments)
                .map_err(|source| ConfigError::Invalid {
                    index,
                    input: test.input(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Generate a default configuration
    pub fn default_config() -> Self {
        Config {
            defaults: TestOptions::default(),
            tests: vec![
                TestConfig::new("tcp", "localhost").with_argument("port", "22"),
                TestConfig::new("tcp", "::1").with_argument("port", "22"),
            ],
        }
    }
}
