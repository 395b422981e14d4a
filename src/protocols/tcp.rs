//! TCP Reachability Test
//!
//! Connects to a remote host and does nothing else.
//!
//! ## What it checks
//!
//! 1. A TCP connection to `target:port` completes within the timeout
//! 2. Nothing is sent or received; the connection is closed straight away
//!
//! Every dial failure (resolution, refusal, routing, timeout) is reported as
//! a single `ConnectionFailure` carrying the underlying cause.
//!
//! ## Arguments
//!
//! - `port`: port to connect to (required, decimal digits)
//!
//! Declared as `host.example.com must run tcp with port 873`.

use async_trait::async_trait;
use std::sync::LazyLock;
use tokio::net::TcpStream;
use tracing::debug;

use super::registry::Registry;
use super::schema::ArgumentSchema;
use super::traits::{Arguments, ProtocolTest, TestError, TestOptions};

/// Name this test is registered under
pub const NAME: &str = "tcp";

/// Pattern a `port` value must match
const PORT_PATTERN: &str = r"^[0-9]+$";

static SCHEMA: LazyLock<ArgumentSchema> =
    LazyLock::new(|| ArgumentSchema::new().required("port", PORT_PATTERN));

/// TCP connect check
pub struct TcpTest;

/// Register the TCP test
pub fn register(registry: &mut Registry) {
    registry.register(NAME, || Box::new(TcpTest));
}

/// Build the address to dial
///
/// Targets containing `:` are IPv6 literals and get bracketed.
pub fn dial_address(target: &str, port: u16) -> String {
    if target.contains(':') {
        format!("[{target}]:{port}")
    } else {
        format!("{target}:{port}")
    }
}

/// Extract the required `port` argument
///
/// The dispatcher has already applied the schema; this still guards direct
/// callers of `run_test` and values too large for a port.
fn port(args: &Arguments) -> Result<u16, TestError> {
    let value = match args.get("port") {
        Some(value) if !value.is_empty() => value,
        _ => return Err(TestError::MissingArgument("port".to_string())),
    };

    value
        .parse()
        .map_err(|e| TestError::invalid_argument("port", format!("'{value}' is not a port: {e}")))
}

#[async_trait]
impl ProtocolTest for TcpTest {
    fn description(&self) -> &'static str {
        "Check that a TCP connection can be established"
    }

    fn arguments(&self) -> ArgumentSchema {
        SCHEMA.clone()
    }

    async fn run_test(
        &self,
        target: &str,
        args: &Arguments,
        opts: &TestOptions,
    ) -> Result<(), TestError> {
        let port = port(args)?;
        let address = dial_address(target, port);

        debug!(address = %address, timeout = ?opts.timeout, "Connecting");

        let stream = match tokio::time::timeout(opts.timeout, TcpStream::connect(&address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(address = %address, error = %e, "Connection failed");
                return Err(TestError::ConnectionFailure {
                    address,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                debug!(address = %address, "Connection timed out");
                return Err(TestError::ConnectionFailure {
                    reason: format!("connection timed out after {:?}", opts.timeout),
                    address,
                });
            }
        };

        debug!(address = %address, "Connected");

        // Close without reading or writing
        drop(stream);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use vigil_testkit::{LocalListener, closed_port};

    fn port_args(port: impl ToString) -> Arguments {
        let mut args = Arguments::new();
        args.insert("port".to_string(), port.to_string());
        args
    }

    fn opts() -> TestOptions {
        TestOptions::with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_dial_address_ipv4_and_hostname() {
        assert_eq!(dial_address("example.com", 80), "example.com:80");
        assert_eq!(dial_address("192.0.2.1", 443), "192.0.2.1:443");
    }

    #[test]
    fn test_dial_address_ipv6() {
        assert_eq!(dial_address("::1", 22), "[::1]:22");
        assert_eq!(dial_address("2001:db8::1", 873), "[2001:db8::1]:873");
    }

    #[test]
    fn test_schema_declares_port() {
        let schema = TcpTest.arguments();
        assert_eq!(schema.pattern("port"), Some(PORT_PATTERN));
        assert!(schema.is_required("port"));
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_port_parsing() {
        assert_eq!(port(&port_args(873)).unwrap(), 873);
        assert!(matches!(
            port(&Arguments::new()),
            Err(TestError::MissingArgument(_))
        ));
        assert!(matches!(
            port(&port_args("")),
            Err(TestError::MissingArgument(_))
        ));
        assert!(matches!(
            port(&port_args("abc")),
            Err(TestError::InvalidArgument { .. })
        ));
        assert!(matches!(
            port(&port_args(70000)),
            Err(TestError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_connects_to_listener() {
        let listener = LocalListener::spawn().await.unwrap();

        TcpTest
            .run_test("127.0.0.1", &port_args(listener.port()), &opts())
            .await
            .unwrap();

        listener.wait_for_accepts(1).await;
        assert_eq!(listener.accepted(), 1);
    }

    #[tokio::test]
    async fn test_closed_port_fails() {
        let port = closed_port().await.unwrap();
        let start = Instant::now();

        let err = TcpTest
            .run_test("127.0.0.1", &port_args(port), &opts())
            .await
            .unwrap_err();

        assert!(matches!(err, TestError::ConnectionFailure { ref address, .. }
            if *address == format!("127.0.0.1:{port}")));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_port_never_dials() {
        let err = TcpTest
            .run_test("127.0.0.1", &Arguments::new(), &opts())
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::MissingArgument(ref name) if name == "port"));
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let listener = LocalListener::spawn().await.unwrap();
        let args = port_args(listener.port());

        for _ in 0..2 {
            assert!(TcpTest.run_test("127.0.0.1", &args, &opts()).await.is_ok());
        }

        let port = closed_port().await.unwrap();
        let args = port_args(port);
        for _ in 0..2 {
            assert!(TcpTest.run_test("127.0.0.1", &args, &opts()).await.is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_dial_times_out() {
        let opts = TestOptions::with_timeout(Duration::from_millis(200));

        let err = TcpTest
            .run_test("10.255.255.1", &port_args(81), &opts)
            .await
            .unwrap_err();

        match err {
            TestError::ConnectionFailure { address, reason } => {
                assert_eq!(address, "10.255.255.1:81");
                assert!(reason.contains("timed out after 200ms"), "{reason}");
            }
            other => panic!("expected connection failure, got {other:?}"),
        }
    }
}
