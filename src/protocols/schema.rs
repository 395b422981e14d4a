//! Argument schemas
//!
//! Each protocol test declares the arguments it understands, with a regular
//! expression every supplied value must match. The dispatcher validates a
//! caller's arguments against this schema before a test ever runs; external
//! parsers can use the same schema to reject bad declarations early.

use indexmap::IndexMap;
use regex::Regex;

use super::traits::{Arguments, TestError};

/// A declared argument: its pattern, compiled once at declaration
#[derive(Debug, Clone)]
struct Declared {
    pattern: &'static str,
    compiled: Result<Regex, regex::Error>,
    required: bool,
}

/// Mapping from argument name to validation pattern, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    arguments: IndexMap<&'static str, Declared>,
}

impl ArgumentSchema {
    /// Create an empty schema (a test that takes no arguments)
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional argument and its pattern
    pub fn with(self, name: &'static str, pattern: &'static str) -> Self {
        self.declare(name, pattern, false)
    }

    /// Declare an argument that must always be supplied
    pub fn required(self, name: &'static str, pattern: &'static str) -> Self {
        self.declare(name, pattern, true)
    }

    fn declare(mut self, name: &'static str, pattern: &'static str, required: bool) -> Self {
        self.arguments.insert(
            name,
            Declared {
                pattern,
                compiled: Regex::new(pattern),
                required,
            },
        );
        self
    }

    /// Pattern declared for `name`
    pub fn pattern(&self, name: &str) -> Option<&'static str> {
        self.arguments.get(name).map(|d| d.pattern)
    }

    /// Whether `name` is declared
    pub fn contains(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// Whether `name` is declared as required
    pub fn is_required(&self, name: &str) -> bool {
        self.arguments.get(name).is_some_and(|d| d.required)
    }

    /// All declared `(name, pattern)` pairs
    pub fn patterns(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.arguments.iter().map(|(name, d)| (*name, d.pattern))
    }

    /// Number of declared arguments
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Whether the test takes no arguments
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Check a single value against the pattern declared for `name`
    pub fn validate_value(&self, name: &str, value: &str) -> Result<(), TestError> {
        let declared = self
            .arguments
            .get(name)
            .ok_or_else(|| TestError::invalid_argument(name, "not recognised by this protocol"))?;

        let re = declared
            .compiled
            .as_ref()
            .map_err(|source| TestError::InvalidPattern {
                name: name.to_string(),
                source: source.clone(),
            })?;

        if re.is_match(value) {
            Ok(())
        } else {
            Err(TestError::invalid_argument(
                name,
                format!("value '{value}' does not match {}", declared.pattern),
            ))
        }
    }

    /// Check every supplied argument against the schema
    ///
    /// Fails on the first argument (in name order) that is undeclared or
    /// whose value does not match, then on the first required argument
    /// (in declaration order) that is absent or empty.
    pub fn validate(&self, args: &Arguments) -> Result<(), TestError> {
        for (name, value) in args {
            self.validate_value(name, value)?;
        }

        for (name, declared) in &self.arguments {
            if declared.required && args.get(*name).is_none_or(|v| v.is_empty()) {
                return Err(TestError::MissingArgument(name.to_string()));
            }
        }

        Ok(())
    }
}
