//! Reader session settings.
//!
//! Settings come either from serde (TOML/JSON with defaults for every field)
//! or from a Java-style properties file using the keys below.

use crate::error::{ReaderError, Result};
use crate::tag::DEFAULT_TAG_MAX_LENGTH;
use rfidlink_transport::{DataBits, Parity, SerialConfig, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Serial port name.
pub const KEY_PORT: &str = "rfid.default.port";
/// Baud rate (required).
pub const KEY_BAUD_RATE: &str = "serial.baudrate";
/// Data bits, 5 to 8 (required).
pub const KEY_DATA_BITS: &str = "serial.databits";
/// Stop bits, 1 or 2 (required).
pub const KEY_STOP_BITS: &str = "serial.stopbits";
/// Parity code: 0 none, 1 odd, 2 even (required).
pub const KEY_PARITY: &str = "serial.parity";
/// Maximum tag identifier length.
pub const KEY_TAG_MAX_LENGTH: &str = "rfid.tag.max.length";

/// Port used when the properties do not name one.
pub const DEFAULT_PORT: &str = "COM1";

/// Reader session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Serial link settings.
    pub serial: SerialConfig,

    /// Maximum accepted tag identifier length.
    pub tag_max_length: usize,

    /// Buffer size for tag reads.
    pub read_buffer_size: usize,

    /// Buffer size for command replies.
    pub command_buffer_size: usize,

    /// Wait between sending a command and reading its reply.
    pub command_settle_ms: u64,

    /// Wait between a write frame and the verification read.
    pub write_settle_ms: u64,

    /// Pause between auto-detection polls.
    pub poll_interval_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::new(DEFAULT_PORT),
            tag_max_length: DEFAULT_TAG_MAX_LENGTH,
            read_buffer_size: 64,
            command_buffer_size: 256,
            command_settle_ms: 100,
            write_settle_ms: 100,
            poll_interval_ms: 200,
        }
    }
}

impl ReaderConfig {
    /// Default settings on the given port.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            serial: SerialConfig::new(port_name),
            ..Self::default()
        }
    }

    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_tag_max_length(mut self, max: usize) -> Self {
        self.tag_max_length = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn command_settle(&self) -> Duration {
        Duration::from_millis(self.command_settle_ms)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Configuration` for a zero buffer or tag length,
    /// or when the serial settings are invalid.
    pub fn validate(&self) -> Result<()> {
        self.serial
            .validate()
            .map_err(|e| ReaderError::configuration(e.to_string()))?;

        if self.tag_max_length == 0 {
            return Err(ReaderError::configuration(
                "tag_max_length must be greater than zero",
            ));
        }
        if self.read_buffer_size == 0 || self.command_buffer_size == 0 {
            return Err(ReaderError::configuration(
                "buffer sizes must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Build settings from properties using the `rfid.*` and `serial.*` keys.
    ///
    /// The port defaults to `COM1` and the tag length to 20. The four serial
    /// line settings have no default and must be present.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Configuration` naming the key that is missing or
    /// malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use rfidlink_reader::config::{ReaderConfig, parse_properties};
    ///
    /// let props = parse_properties(
    ///     "rfid.default.port=/dev/ttyUSB0\n\
    ///      serial.baudrate=9600\n\
    ///      serial.databits=8\n\
    ///      serial.stopbits=1\n\
    ///      serial.parity=0\n",
    /// );
    /// let config = ReaderConfig::from_properties(&props).unwrap();
    /// assert_eq!(config.serial.port_name, "/dev/ttyUSB0");
    /// assert_eq!(config.serial.baud_rate, 9600);
    /// assert_eq!(config.tag_max_length, 20);
    /// ```
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let port = props
            .get(KEY_PORT)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PORT);

        let baud_rate: u32 = required(props, KEY_BAUD_RATE)?;

        let data_bits = DataBits::try_from(required::<u8>(props, KEY_DATA_BITS)?)
            .map_err(|e| ReaderError::configuration(format!("{KEY_DATA_BITS}: {e}")))?;

        let stop_bits = StopBits::try_from(required::<u8>(props, KEY_STOP_BITS)?)
            .map_err(|e| ReaderError::configuration(format!("{KEY_STOP_BITS}: {e}")))?;

        let parity = Parity::from_code(required(props, KEY_PARITY)?)
            .map_err(|e| ReaderError::configuration(format!("{KEY_PARITY}: {e}")))?;

        let tag_max_length = match props.get(KEY_TAG_MAX_LENGTH) {
            Some(_) => required(props, KEY_TAG_MAX_LENGTH)?,
            None => DEFAULT_TAG_MAX_LENGTH,
        };

        let serial = SerialConfig::new(port)
            .with_baud_rate(baud_rate)
            .with_data_bits(data_bits)
            .with_stop_bits(stop_bits)
            .with_parity(parity);

        let config = Self::default()
            .with_serial(serial)
            .with_tag_max_length(tag_max_length);
        config.validate()?;
        Ok(config)
    }
}

fn required<T: FromStr>(props: &HashMap<String, String>, key: &str) -> Result<T> {
    let raw = props
        .get(key)
        .ok_or_else(|| ReaderError::configuration(format!("missing required key {key}")))?;

    raw.trim().parse().map_err(|_| {
        ReaderError::configuration(format!("invalid value for {key}: {:?}", raw.trim()))
    })
}

/// Parse properties text into a key/value map.
///
/// Accepts `key=value` and `key: value` lines. Blank lines and lines starting
/// with `#` or `!` are skipped. Later keys override earlier ones.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base_props() -> HashMap<String, String> {
        parse_properties(
            "# reader settings\n\
             rfid.default.port = COM3\n\
             serial.baudrate=115200\n\
             serial.databits=8\n\
             serial.stopbits=1\n\
             serial.parity=0\n",
        )
    }

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.serial.port_name, "COM1");
        assert_eq!(config.tag_max_length, 20);
        assert_eq!(config.read_buffer_size, 64);
        assert_eq!(config.command_buffer_size, 256);
        assert_eq!(config.command_settle(), Duration::from_millis(100));
        assert_eq!(config.write_settle(), Duration::from_millis(100));
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_poll_interval_saturates() {
        let config = ReaderConfig::default().with_poll_interval(Duration::MAX);
        assert_eq!(config.poll_interval_ms, u64::MAX);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = ReaderConfig::default().with_tag_max_length(0);
        assert!(matches!(
            config.validate(),
            Err(ReaderError::Configuration { .. })
        ));

        let config = ReaderConfig {
            read_buffer_size: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReaderConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_properties() {
        let mut props = base_props();
        props.insert(KEY_PARITY.to_string(), "2".to_string());
        props.insert(KEY_TAG_MAX_LENGTH.to_string(), "24".to_string());

        let config = ReaderConfig::from_properties(&props).unwrap();
        assert_eq!(config.serial.port_name, "COM3");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.data_bits, DataBits::Eight);
        assert_eq!(config.serial.stop_bits, StopBits::One);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.tag_max_length, 24);
    }

    #[test]
    fn test_from_properties_defaults_port() {
        let mut props = base_props();
        props.remove(KEY_PORT);

        let config = ReaderConfig::from_properties(&props).unwrap();
        assert_eq!(config.serial.port_name, DEFAULT_PORT);
        assert_eq!(config.tag_max_length, DEFAULT_TAG_MAX_LENGTH);
    }

    #[rstest]
    #[case(KEY_BAUD_RATE)]
    #[case(KEY_DATA_BITS)]
    #[case(KEY_STOP_BITS)]
    #[case(KEY_PARITY)]
    fn test_from_properties_missing_required(#[case] key: &str) {
        let mut props = base_props();
        props.remove(key);

        let err = ReaderConfig::from_properties(&props).unwrap_err();
        assert!(matches!(err, ReaderError::Configuration { .. }));
        assert!(err.to_string().contains(key));
    }

    #[rstest]
    #[case(KEY_BAUD_RATE, "fast")]
    #[case(KEY_DATA_BITS, "9")]
    #[case(KEY_STOP_BITS, "3")]
    #[case(KEY_PARITY, "3")]
    #[case(KEY_TAG_MAX_LENGTH, "-1")]
    fn test_from_properties_malformed(#[case] key: &str, #[case] value: &str) {
        let mut props = base_props();
        props.insert(key.to_string(), value.to_string());

        let err = ReaderConfig::from_properties(&props).unwrap_err();
        assert!(matches!(err, ReaderError::Configuration { .. }));
    }

    #[test]
    fn test_parse_properties_syntax() {
        let props = parse_properties(
            "! legacy comment\n\
             \n\
             a=1\n\
             b : two\n\
             c=x=y\n\
             no_separator\n\
             a=3\n",
        );

        assert_eq!(props.get("a").map(String::as_str), Some("3"));
        assert_eq!(props.get("b").map(String::as_str), Some("two"));
        assert_eq!(props.get("c").map(String::as_str), Some("x=y"));
        assert!(!props.contains_key("no_separator"));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: ReaderConfig =
            serde_json::from_str(r#"{"serial":{"port_name":"COM7"},"poll_interval_ms":50}"#)
                .unwrap();

        assert_eq!(config.serial.port_name, "COM7");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.read_buffer_size, 64);
    }
}
