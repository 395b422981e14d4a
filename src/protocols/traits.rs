//! Protocol test trait and supporting types
//!
//! The `ProtocolTest` trait defines the interface every protocol test
//! implements. Tests receive the target, the caller's `Arguments` and
//! `TestOptions`, and either succeed or return a `TestError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use super::schema::ArgumentSchema;

/// Default time a test may spend on blocking I/O
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Named string arguments supplied for a single invocation
///
/// Ordered so that validation reports the same offending argument every time.
pub type Arguments = BTreeMap<String, String>;

/// Errors that can occur while resolving, validating or running a test
#[derive(Debug, Error)]
pub enum TestError {
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Missing required argument '{0}'")]
    MissingArgument(String),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Invalid pattern for argument '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("{address} unreachable: {reason}")]
    ConnectionFailure { address: String, reason: String },

    #[error("Protocol test '{protocol}' exceeded its {timeout:?} deadline")]
    DeadlineExceeded { protocol: String, timeout: Duration },
}

impl TestError {
    /// Build an `InvalidArgument` error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Name of the argument this error refers to, if any
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::MissingArgument(name)
            | Self::InvalidArgument { name, .. }
            | Self::InvalidPattern { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the target itself was found unreachable
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure { .. } | Self::DeadlineExceeded { .. }
        )
    }
}

/// Options passed uniformly to every protocol test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOptions {
    /// Maximum time the test's I/O may take before it must fail
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TestOptions {
    /// Options with the given timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Outcome of a single dispatched test, suitable for printing or shipping
/// to a notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Protocol name the test was dispatched under
    pub protocol: String,
    /// Target host or address
    pub target: String,
    /// Arguments the test was invoked with
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
    /// Whether the test succeeded
    pub passed: bool,
    /// Failure cause, if the test failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How long the dispatch took
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl TestReport {
    /// Render the test in its human-readable declaration form,
    /// e.g. `host must run tcp with port 22`
    pub fn input(&self) -> String {
        declaration(&self.target, &self.protocol, &self.arguments)
    }
}

/// Render a test in its human-readable declaration form
pub fn declaration(target: &str, protocol: &str, args: &Arguments) -> String {
    let mut input = format!("{target} must run {protocol}");
    for (name, value) in args {
        input.push_str(&format!(" with {name} {value}"));
    }
    input
}

/// Trait for implementing protocol tests
///
/// Each implementation judges whether a remote service answers on one
/// transport or protocol. Instances are produced by a factory in the
/// [`Registry`](super::Registry), one per invocation, and hold no state
/// between calls.
///
/// ## Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use vigil::protocols::{ArgumentSchema, Arguments, ProtocolTest, TestError, TestOptions};
///
/// pub struct EchoTest;
///
/// #[async_trait]
/// impl ProtocolTest for EchoTest {
///     fn description(&self) -> &'static str { "Checks an echo service" }
///
///     fn arguments(&self) -> ArgumentSchema {
///         ArgumentSchema::new().with("port", r"^[0-9]+$")
///     }
///
///     async fn run_test(
///         &self,
///         target: &str,
///         args: &Arguments,
///         opts: &TestOptions,
///     ) -> Result<(), TestError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait ProtocolTest: Send + Sync {
    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Argument names this test understands and the pattern each value
    /// must match
    fn arguments(&self) -> ArgumentSchema;

    /// Run the test against `target`
    ///
    /// Any blocking I/O must give up once `opts.timeout` has elapsed.
    async fn run_test(
        &self,
        target: &str,
        args: &Arguments,
        opts: &TestOptions,
    ) -> Result<(), TestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = TestOptions::default();
        assert_eq!(opts.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_options_parse_human_durations() {
        let opts: TestOptions = serde_json::from_str(r#"{"timeout": "1m 30s"}"#).unwrap();
        assert_eq!(opts.timeout, Duration::from_secs(90));

        let opts: TestOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, TestOptions::default());
    }

    #[test]
    fn test_error_argument_name() {
        assert_eq!(
            TestError::MissingArgument("port".into()).argument(),
            Some("port")
        );
        assert_eq!(
            TestError::invalid_argument("port", "not a number").argument(),
            Some("port")
        );
        assert_eq!(TestError::UnknownProtocol("x".into()).argument(), None);
    }

    #[test]
    fn test_connection_failure_message() {
        let err = TestError::ConnectionFailure {
            address: "example.com:80".into(),
            reason: "connection refused".into(),
        };
        assert!(err.is_unreachable());
        assert_eq!(
            err.to_string(),
            "example.com:80 unreachable: connection refused"
        );
    }

    #[test]
    fn test_report_input() {
        let mut arguments = Arguments::new();
        arguments.insert("port".into(), "873".into());
        let report = TestReport {
            protocol: "tcp".into(),
            target: "host.example.com".into(),
            arguments,
            passed: true,
            error: None,
            duration: Duration::from_millis(5),
        };
        assert_eq!(report.input(), "host.example.com must run tcp with port 873");
    }

    #[test]
    fn test_report_serialization_skips_empty_fields() {
        let report = TestReport {
            protocol: "tcp".into(),
            target: "localhost".into(),
            arguments: Arguments::new(),
            passed: true,
            error: None,
            duration: Duration::from_secs(1),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("arguments").is_none());
        assert_eq!(json["duration"], "1s");
    }
}
