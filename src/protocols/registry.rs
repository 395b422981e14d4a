//! Protocol registry
//!
//! Maps protocol names to factories producing fresh test instances.
//!
//! The registry is an ordinary value: build it once at startup, hand it to a
//! [`Dispatcher`](super::Dispatcher), and only read from it afterwards.
//! Every compiled-in protocol contributes a single `register` call to
//! [`Registry::builtin`]; tests can build a registry holding only the
//! protocols they need.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use super::tcp;
use super::traits::{ProtocolTest, TestError};

/// Constructor for a protocol test instance
pub type Factory = Arc<dyn Fn() -> Box<dyn ProtocolTest> + Send + Sync>;

/// Table of available protocol tests, keyed by case-sensitive name
///
/// Uses IndexMap so registration order is kept for listing.
#[derive(Clone, Default)]
pub struct Registry {
    factories: IndexMap<String, Factory>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("protocols", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in protocol
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        tcp::register(&mut registry);
        registry
    }

    /// Record `factory` under `name`
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ProtocolTest> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            debug!(protocol = %name, "Replacing existing protocol registration");
        } else {
            debug!(protocol = %name, "Registered protocol");
        }
    }

    /// Get the factory registered under `name`
    pub fn lookup(&self, name: &str) -> Result<Factory, TestError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| TestError::UnknownProtocol(name.to_string()))
    }

    /// Whether a protocol is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List all registered protocol names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered protocols
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no protocol is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{ArgumentSchema, Arguments, TestOptions};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub(&'static str);

    #[async_trait]
    impl ProtocolTest for Stub {
        fn description(&self) -> &'static str {
            self.0
        }

        fn arguments(&self) -> ArgumentSchema {
            ArgumentSchema::new()
        }

        async fn run_test(
            &self,
            _target: &str,
            _args: &Arguments,
            _opts: &TestOptions,
        ) -> Result<(), TestError> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_protocols_registered() {
        let registry = Registry::builtin();
        assert!(registry.contains("tcp"));
        assert_eq!(registry.names(), vec!["tcp"]);
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        let err = registry.lookup("nonexistent").err().unwrap();
        assert!(matches!(err, TestError::UnknownProtocol(ref name) if name == "nonexistent"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let registry = Registry::builtin();
        assert!(registry.lookup("TCP").is_err());
    }

    #[test]
    fn test_factory_builds_fresh_instance_each_call() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut registry = Registry::new();
        registry.register("stub", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(Stub("stub")) as Box<dyn ProtocolTest>
        });

        let factory = registry.lookup("stub").unwrap();
        let first = factory();
        let second = factory();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        let first_ptr = &*first as *const dyn ProtocolTest as *const u8;
        let second_ptr = &*second as *const dyn ProtocolTest as *const u8;
        assert_ne!(first_ptr, second_ptr);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register("stub", || Box::new(Stub("first")));
        registry.register("stub", || Box::new(Stub("second")));

        assert_eq!(registry.len(), 1);
        let test = registry.lookup("stub").unwrap()();
        assert_eq!(test.description(), "second");
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = Registry::new();
        registry.register("tcp", || Box::new(Stub("tcp")));
        registry.register("http", || Box::new(Stub("http")));
        registry.register("dns", || Box::new(Stub("dns")));
        assert_eq!(registry.names(), vec!["dns", "http", "tcp"]);
    }
}
