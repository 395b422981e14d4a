//! Configuration parsing
//!
//! Handles parsing of test plan files.
//!
//! ## Configuration Format
//!
//! ```yaml
//! defaults:
//!   timeout: 10s
//!
//! tests:
//!   - protocol: tcp
//!     target: host.example.com
//!     arguments:
//!       port: 873
//!
//!   - protocol: tcp
//!     target: '2001:db8::1'
//!     arguments:
//!       port: 22
//!     timeout: 3s
//! ```

mod plan;

pub use plan::{Config, ConfigError, TestConfig};
