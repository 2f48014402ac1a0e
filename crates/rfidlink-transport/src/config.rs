//! Serial connection configuration.
//!
//! A [`SerialConfig`] is handed to [`Transport::open`](crate::Transport::open)
//! and stays fixed for the lifetime of the open port. Changing any value
//! means closing and reopening.

use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default blocking-read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Default write timeout in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 500;

/// Default baud rate for UHF desktop readers.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = TransportError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(TransportError::configuration(format!(
                "Data bits must be 5-8, got {other}"
            ))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = TransportError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(TransportError::configuration(format!(
                "Stop bits must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Map a numeric parity code (0 none, 1 odd, 2 even) to a parity mode.
    ///
    /// Mark (3) and space (4) parity exist on some platforms but are not
    /// supported by the serial backend, so they are rejected here rather
    /// than failing later at open time.
    ///
    /// # Examples
    ///
    /// ```
    /// use rfidlink_transport::Parity;
    ///
    /// assert_eq!(Parity::from_code(2).unwrap(), Parity::Even);
    /// assert!(Parity::from_code(3).is_err());
    /// ```
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Odd),
            2 => Ok(Self::Even),
            other => Err(TransportError::configuration(format!(
                "Unsupported parity code {other}"
            ))),
        }
    }

    /// Numeric code of this parity mode.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Odd => write!(f, "odd"),
            Self::Even => write!(f, "even"),
        }
    }
}

/// Connection parameters for one serial port.
///
/// # Examples
///
/// ```
/// use rfidlink_transport::{Parity, SerialConfig, StopBits};
/// use std::time::Duration;
///
/// let config = SerialConfig::new("/dev/ttyUSB0")
///     .with_baud_rate(57_600)
///     .with_parity(Parity::Even)
///     .with_stop_bits(StopBits::Two);
///
/// assert_eq!(config.read_timeout(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port identifier (e.g. `COM3`, `/dev/ttyUSB0`).
    pub port_name: String,

    /// Line speed in bits per second.
    pub baud_rate: u32,

    pub data_bits: DataBits,

    pub stop_bits: StopBits,

    pub parity: Parity,

    /// Blocking-read timeout in milliseconds.
    pub read_timeout_ms: u64,

    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: "COM1".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl SerialConfig {
    /// Create a configuration for `port_name` with 8N1 framing and default timeouts.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the data bits.
    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Set the stop bits.
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Set the parity mode.
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the blocking-read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Check the values that cannot be expressed through the enum types.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the port name is empty or the baud
    /// rate is zero.
    pub fn validate(&self) -> Result<()> {
        if self.port_name.trim().is_empty() {
            return Err(TransportError::configuration("Port name must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::configuration("Baud rate must be non-zero"));
        }
        Ok(())
    }
}
