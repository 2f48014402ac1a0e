//! Serial transport layer for rfidlink.
//!
//! This crate owns the physical channel to an RFID reader: opening and
//! configuring the port, writing raw bytes, and reading raw bytes with a
//! timeout. It knows nothing about commands, tags or sessions; that lives in
//! `rfidlink-reader`.
//!
//! # Design
//!
//! - **Async-first**: the [`Transport`] trait uses native async methods whose
//!   futures are `Send`, so a transport can be driven from a spawned task.
//! - **Timeouts are not errors**: a read that times out with nothing received
//!   returns an empty buffer. Only real faults become [`TransportError`]s.
//! - **Swappable backends**: [`SerialTransport`] talks to hardware through the
//!   `serialport` crate; [`MockTransport`](mock::MockTransport) simulates a
//!   reader for tests; [`AnyTransport`](devices::AnyTransport) selects one at
//!   runtime.
//!
//! # Example
//!
//! ```no_run
//! use rfidlink_transport::{SerialConfig, SerialTransport, Transport};
//!
//! # async fn example() -> rfidlink_transport::Result<()> {
//! let config = SerialConfig::new("/dev/ttyUSB0").with_baud_rate(115_200);
//!
//! let mut transport = SerialTransport::new();
//! transport.open(&config).await?;
//! transport.send_bytes(b"STATUS\r\n").await?;
//! let reply = transport.receive_bytes(256).await?;
//! println!("{}", String::from_utf8_lossy(&reply));
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `hardware-serial` (default): enables [`SerialTransport`].

pub mod config;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-serial")]
pub mod serial;
pub mod traits;

pub use config::{DataBits, Parity, SerialConfig, StopBits};
pub use devices::AnyTransport;
pub use error::{Result, TransportError};
#[cfg(feature = "hardware-serial")]
pub use serial::{SerialTransport, available_ports};
pub use traits::Transport;
