//! Protocol tests
//!
//! This module provides the `ProtocolTest` trait, the registry that maps
//! protocol names to test factories, and the dispatcher that validates and
//! runs a test by name.
//!
//! ## Flow
//!
//! caller → `Dispatcher::execute(name, ..)` → `Registry::lookup(name)` →
//! factory → fresh test → `ArgumentSchema::validate` → `run_test`
//!
//! ## Adding New Protocols
//!
//! 1. Create a new file in `src/protocols/` (e.g., `http.rs`)
//! 2. Implement the `ProtocolTest` trait
//! 3. Add a `register(&mut Registry)` function and call it from
//!    `Registry::builtin`

mod dispatch;
pub mod registry;
mod schema;
pub mod tcp;
mod traits;

pub use dispatch::{DEADLINE_SLACK, Dispatcher};
pub use registry::{Factory, Registry};
pub use schema::ArgumentSchema;
pub use tcp::TcpTest;
pub use traits::*;
