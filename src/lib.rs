//! Vigil - Pluggable Reachability Tests
//!
//! A registry of independently implemented protocol tests, each judging
//! whether a remote service answers on a given transport or protocol, and a
//! dispatcher that validates and runs them by name.
//!
//! ## Architecture
//!
//! - Every protocol test implements [`protocols::ProtocolTest`] and declares
//!   its arguments as an [`protocols::ArgumentSchema`]
//! - Protocols register a factory in a [`protocols::Registry`] at startup
//! - A [`protocols::Dispatcher`] resolves a name, validates the arguments
//!   and runs a fresh test instance under the caller's timeout
//!
//! ## Modules
//!
//! - [`protocols`] - Trait, registry, dispatcher and the TCP test
//! - [`config`] - Test plan file parsing

pub mod config;
pub mod protocols;
