//! Vigil Test Kit
//!
//! Test infrastructure for exercising protocol tests against real sockets.
//!
//! This crate provides:
//! - A local TCP listener that accepts and counts connections
//! - A port on which nothing is listening
//!
//! # Example
//!
//! ```rust
//! use vigil_testkit::LocalListener;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> std::io::Result<()> {
//! let listener = LocalListener::spawn().await?;
//! let stream = tokio::net::TcpStream::connect(listener.addr()).await?;
//! drop(stream);
//!
//! listener.wait_for_accepts(1).await;
//! assert_eq!(listener.accepted(), 1);
//! # Ok(())
//! # }
//! ```

pub mod listener;

// Re-exports for convenience
pub use listener::{LocalListener, closed_port};
