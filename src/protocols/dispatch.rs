//! Protocol dispatch
//!
//! Resolves a protocol name through the [`Registry`], builds a fresh test
//! instance, validates the caller's arguments against the instance's schema
//! and invokes it. One call is one resolution, one instantiation and one
//! invocation; there are no retries at this layer.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::registry::Registry;
use super::schema::ArgumentSchema;
use super::traits::{Arguments, ProtocolTest, TestError, TestOptions, TestReport};

/// Extra time granted on top of `TestOptions::timeout` before a test that
/// ignores its own timeout is abandoned
pub const DEADLINE_SLACK: Duration = Duration::from_secs(1);

/// Runs protocol tests by name
///
/// Cloning is cheap; clones share the same registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Registry::builtin())
    }
}

impl Dispatcher {
    /// Create a dispatcher over `registry`
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The registry this dispatcher resolves names against
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Build a fresh instance of the test registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Box<dyn ProtocolTest>, TestError> {
        let factory = self.registry.lookup(name)?;
        Ok(factory())
    }

    /// Argument schema of the test registered under `name`
    pub fn arguments(&self, name: &str) -> Result<ArgumentSchema, TestError> {
        Ok(self.resolve(name)?.arguments())
    }

    /// Validate `args` for the protocol `name` without running anything
    pub fn validate(&self, name: &str, args: &Arguments) -> Result<(), TestError> {
        self.arguments(name)?.validate(args)
    }

    /// Run the test registered under `name` against `target`
    pub async fn execute(
        &self,
        name: &str,
        target: &str,
        args: &Arguments,
        opts: &TestOptions,
    ) -> Result<(), TestError> {
        let test = self.resolve(name)?;
        test.arguments().validate(args)?;

        debug!(protocol = %name, target = %target, timeout = ?opts.timeout, "Running protocol test");

        let deadline = opts.timeout.saturating_add(DEADLINE_SLACK);
        let result = tokio::time::timeout(deadline, test.run_test(target, args, opts))
            .await
            .unwrap_or_else(|_| {
                Err(TestError::DeadlineExceeded {
                    protocol: name.to_string(),
                    timeout: opts.timeout,
                })
            });

        debug!(protocol = %name, target = %target, passed = result.is_ok(), "Protocol test finished");

        result
    }

    /// Run a test and capture the outcome as a [`TestReport`]
    pub async fn report(
        &self,
        name: &str,
        target: &str,
        args: &Arguments,
        opts: &TestOptions,
    ) -> TestReport {
        let start = Instant::now();
        let result = self.execute(name, target, args, opts).await;

        TestReport {
            protocol: name.to_string(),
            target: target.to_string(),
            arguments: args.clone(),
            passed: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            duration: start.elapsed(),
        }
    }
}
