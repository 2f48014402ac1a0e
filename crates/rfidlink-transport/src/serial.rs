//! Serial port transport backed by the `serialport` crate.
//!
//! `serialport` exposes blocking I/O. Every port call therefore runs on Tokio's
//! blocking pool, so the async side never blocks a runtime thread. The port is
//! shared with the worker rather than moved into it: a caller that stops
//! waiting (a timeout, a dropped future) leaves the port with the transport,
//! and the next call queues behind the abandoned one.

use crate::config::{DataBits, Parity, SerialConfig, StopBits};
use crate::error::{Result, TransportError};
use crate::traits::Transport;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Transport over a physical serial port.
///
/// # Examples
///
/// ```no_run
/// use rfidlink_transport::{SerialConfig, SerialTransport, Transport};
///
/// # async fn example() -> rfidlink_transport::Result<()> {
/// let mut transport = SerialTransport::new();
/// transport.open(&SerialConfig::new("/dev/ttyUSB0")).await?;
///
/// let data = transport.receive_bytes(64).await?;
/// if data.is_empty() {
///     println!("nothing in range");
/// }
///
/// transport.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SerialTransport {
    /// Open port, `None` while closed.
    port: Option<SharedPort>,

    /// Name of the last opened port, for diagnostics.
    port_name: String,

    read_timeout: Duration,

    write_timeout: Duration,
}

/// Port handle shared between the transport and its blocking workers.
type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("open", &self.port.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport {
    /// Create a closed serial transport.
    pub fn new() -> Self {
        let defaults = SerialConfig::default();
        Self {
            port: None,
            port_name: String::new(),
            read_timeout: defaults.read_timeout(),
            write_timeout: defaults.write_timeout(),
        }
    }

    /// Name of the port this transport was last opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Wrap a port that is already open and configured.
    ///
    /// `read_timeout` must match the timeout set on `port`; writes swap in
    /// `write_timeout` and restore it.
    pub fn from_port(
        port: Box<dyn SerialPort>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            port_name: port.name().unwrap_or_default(),
            port: Some(Arc::new(Mutex::new(port))),
            read_timeout,
            write_timeout,
        }
    }

    /// Run a blocking port operation on the blocking pool.
    ///
    /// Workers take turns on the port lock, so an operation abandoned by its
    /// caller still finishes before the next one starts. A panicking worker
    /// leaves the port usable.
    async fn with_port<R, F>(&mut self, op: F) -> Result<R>
    where
        F: FnOnce(&mut dyn SerialPort) -> std::io::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let port = Arc::clone(self.port.as_ref().ok_or(TransportError::NotOpen)?);

        let joined = tokio::task::spawn_blocking(move || {
            let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut **port)
        })
        .await;

        match joined {
            Ok(result) => Ok(result?),
            Err(e) => {
                error!(port = %self.port_name, "Serial worker failed: {}", e);
                Err(TransportError::task(e.to_string()))
            }
        }
    }
}

impl Transport for SerialTransport {
    async fn open(&mut self, config: &SerialConfig) -> Result<()> {
        config.validate()?;

        if self.port.take().is_some() {
            debug!(port = %self.port_name, "Reopening serial port");
        }

        info!(
            port = %config.port_name,
            baud_rate = config.baud_rate,
            data_bits = u8::from(config.data_bits),
            stop_bits = u8::from(config.stop_bits),
            parity = %config.parity,
            "Opening serial port"
        );

        let port = serialport::new(config.port_name.as_str(), config.baud_rate)
            .data_bits(to_serialport_data_bits(config.data_bits))
            .stop_bits(to_serialport_stop_bits(config.stop_bits))
            .parity(to_serialport_parity(config.parity))
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| {
                error!(port = %config.port_name, "Failed to open serial port: {}", e);
                TransportError::connection(&config.port_name, e.to_string())
            })?;

        self.port = Some(Arc::new(Mutex::new(port)));
        self.port_name = config.port_name.clone();
        self.read_timeout = config.read_timeout();
        self.write_timeout = config.write_timeout();

        info!(port = %self.port_name, "Serial port opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<usize> {
        trace!(port = %self.port_name, len = data.len(), "Sending bytes");

        let data = data.to_vec();
        let read_timeout = self.read_timeout;
        let write_timeout = self.write_timeout;

        // serialport has one timeout for both directions; swap it for the write.
        self.with_port(move |port| {
            port.set_timeout(write_timeout)?;
            let written = port.write(&data).and_then(|n| port.flush().map(|_| n));
            port.set_timeout(read_timeout)?;
            written
        })
        .await
    }

    async fn receive_bytes(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let data = self
            .with_port(move |port| {
                let mut buffer = vec![0u8; max_len];
                match port.read(&mut buffer) {
                    Ok(n) => {
                        buffer.truncate(n);
                        Ok(buffer)
                    }
                    Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            })
            .await?;

        trace!(port = %self.port_name, len = data.len(), "Received bytes");
        Ok(data)
    }
}

/// List the names of serial ports present on this machine.
///
/// # Errors
///
/// Returns a connection error if the platform enumeration fails.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| TransportError::connection("*", e.to_string()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

fn to_serialport_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn to_serialport_stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transport_is_closed() {
        let transport = SerialTransport::new();
        assert!(!transport.is_open());
        assert_eq!(transport.port_name(), "");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut transport = SerialTransport::new();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_io_on_closed_transport() {
        let mut transport = SerialTransport::new();
        assert!(matches!(
            transport.send_bytes(b"STATUS\r\n").await,
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(
            transport.receive_bytes(64).await,
            Err(TransportError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_open_missing_port_is_connection_error() {
        let mut transport = SerialTransport::new();
        let config = SerialConfig::new("/dev/rfidlink-does-not-exist");

        let result = transport.open(&config).await;
        assert!(matches!(result, Err(TransportError::Connection { .. })));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut transport = SerialTransport::new();
        let config = SerialConfig::new("");

        let result = transport.open(&config).await;
        assert!(matches!(result, Err(TransportError::Configuration { .. })));
    }

    /// A transport on one end of a pseudo-terminal pair, and the other end.
    #[cfg(unix)]
    fn pty_transport(read_timeout: Duration) -> (SerialTransport, serialport::TTYPort) {
        let (mut master, mut slave) = serialport::TTYPort::pair().expect("pty pair");
        master.set_timeout(read_timeout).expect("set timeout");
        slave.set_timeout(Duration::from_millis(500)).expect("set timeout");
        let transport =
            SerialTransport::from_port(Box::new(master), read_timeout, Duration::from_millis(500));
        (transport, slave)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_read_keeps_port() {
        let (mut transport, mut device) = pty_transport(Duration::from_millis(100));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), transport.receive_bytes(64)).await;
        assert!(cancelled.is_err());
        assert!(transport.is_open());

        // Let the abandoned read time out before the device answers
        tokio::time::sleep(Duration::from_millis(200)).await;
        device.write_all(b"E200\r\n").unwrap();
        device.flush().unwrap();

        let data = transport.receive_bytes(64).await.unwrap();
        assert_eq!(data, b"E200\r\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_next_call_waits_for_abandoned_read() {
        let (mut transport, mut device) = pty_transport(Duration::from_millis(300));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), transport.receive_bytes(64)).await;
        assert!(cancelled.is_err());

        // Queued behind the abandoned read on the port lock
        let sent = transport.send_bytes(b"STATUS\r\n").await.unwrap();
        assert_eq!(sent, 8);

        let mut buffer = [0u8; 8];
        device.read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"STATUS\r\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_releases_port() {
        let (mut transport, _device) = pty_transport(Duration::from_millis(50));
        assert!(transport.is_open());

        transport.close().await.unwrap();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.receive_bytes(64).await,
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn test_available_ports_names() {
        // Enumeration may legitimately fail on machines without serial support.
        if let Ok(ports) = available_ports() {
            assert!(ports.iter().all(|name| !name.is_empty()));
        }
    }

    #[test]
    fn test_setting_conversions() {
        assert_eq!(
            to_serialport_data_bits(DataBits::Seven),
            serialport::DataBits::Seven
        );
        assert_eq!(
            to_serialport_stop_bits(StopBits::Two),
            serialport::StopBits::Two
        );
        assert_eq!(to_serialport_parity(Parity::Odd), serialport::Parity::Odd);
    }
}
