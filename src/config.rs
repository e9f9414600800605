// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Typed configuration consumed by the session, arbiter and reporter.
//!
//! None of these types read or write any file format themselves; an
//! external key-value store is expected to supply the values an operator
//! sets (`ha.url`, `mmwave.uart`, ...), and the process entry point
//! assembles them into an [`EngineConfig`] from CLI arguments and
//! environment variables.

use clap::Parser;

use crate::error::Error;

/// Per-gate sensitivity thresholds sent to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitivityConfig {
    /// Which gate (0..=8) this applies to.
    pub gate: u8,
    /// Motion energy threshold, 0..=100.
    pub motion_threshold: u8,
    /// Static energy threshold, 0..=100.
    pub static_threshold: u8,
}

impl SensitivityConfig {
    /// Validate and construct a sensitivity configuration.
    pub fn new(gate: u8, motion_threshold: u8, static_threshold: u8) -> Result<Self, Error> {
        if gate > 8 {
            return Err(Error::InvalidArgument(format!(
                "gate {} out of range 0..=8",
                gate
            )));
        }
        if motion_threshold > 100 {
            return Err(Error::InvalidArgument(format!(
                "motion_threshold {} out of range 0..=100",
                motion_threshold
            )));
        }
        if static_threshold > 100 {
            return Err(Error::InvalidArgument(format!(
                "static_threshold {} out of range 0..=100",
                static_threshold
            )));
        }
        Ok(SensitivityConfig {
            gate,
            motion_threshold,
            static_threshold,
        })
    }
}

/// Maximum gate range and unmanned-timeout settings sent to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxGateConfig {
    /// Furthest motion gate to report, 0..=8.
    pub max_motion_gate: u8,
    /// Furthest static gate to report, 0..=8.
    pub max_static_gate: u8,
    /// Seconds of absence before the sensor reports `None` again.
    pub unpresence_timeout_s: u16,
}

impl MaxGateConfig {
    /// Validate and construct a max-gate configuration.
    pub fn new(
        max_motion_gate: u8,
        max_static_gate: u8,
        unpresence_timeout_s: u16,
    ) -> Result<Self, Error> {
        if max_motion_gate > 8 {
            return Err(Error::InvalidArgument(format!(
                "max_motion_gate {} out of range 0..=8",
                max_motion_gate
            )));
        }
        if max_static_gate > 8 {
            return Err(Error::InvalidArgument(format!(
                "max_static_gate {} out of range 0..=8",
                max_static_gate
            )));
        }
        Ok(MaxGateConfig {
            max_motion_gate,
            max_static_gate,
            unpresence_timeout_s,
        })
    }
}

/// Destination and credentials for the state reporter.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Home Assistant host or IP address.
    pub host: String,
    /// Home Assistant port, conventionally 8123.
    pub port: u16,
    /// Long-lived access token sent as a bearer credential.
    pub bearer_token: String,
    /// The entity id to POST state updates for.
    pub entity_id: String,
    /// Minimum milliseconds between reporter ticks.
    pub min_interval_ms: u16,
}

/// UART baud rates the sensor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    /// 9600 baud.
    B9600,
    /// 19200 baud.
    B19200,
    /// 38400 baud.
    B38400,
    /// 57600 baud.
    B57600,
    /// 115200 baud.
    B115200,
    /// 230400 baud.
    B230400,
    /// 256000 baud, the sensor's factory default.
    B256000,
    /// 460800 baud.
    B460800,
}

impl BaudRate {
    /// The rate as a plain integer, for opening the serial port.
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
            BaudRate::B256000 => 256000,
            BaudRate::B460800 => 460800,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            9600 => Ok(BaudRate::B9600),
            19200 => Ok(BaudRate::B19200),
            38400 => Ok(BaudRate::B38400),
            57600 => Ok(BaudRate::B57600),
            115200 => Ok(BaudRate::B115200),
            230400 => Ok(BaudRate::B230400),
            256000 => Ok(BaudRate::B256000),
            460800 => Ok(BaudRate::B460800),
            other => Err(Error::InvalidArgument(format!(
                "unsupported baud rate: {}",
                other
            ))),
        }
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        BaudRate::B256000
    }
}

/// Process-level configuration, assembled from CLI args and environment
/// variables by the daemon entry point. Mirrors the external key-value
/// store's keys (`mmwave.uart`, `mmwave.baud`, `ha.url`, `ha.port`,
/// `ha.token`, `boot.autostart_ha`) without parsing that store's file
/// format itself.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// UART device path the sensor is connected to.
    #[arg(long, env, default_value = "/dev/ttyUSB0")]
    pub uart: String,

    /// UART baud rate.
    #[arg(long, env, default_value_t = 256000)]
    pub baud: u32,

    /// Home Assistant host or IP address.
    #[arg(long, env)]
    pub ha_host: Option<String>,

    /// Home Assistant port.
    #[arg(long, env, default_value_t = 8123)]
    pub ha_port: u16,

    /// Home Assistant long-lived access token.
    #[arg(long, env)]
    pub ha_token: Option<String>,

    /// Entity id to report state under.
    #[arg(long, env, default_value = "binary_sensor.mmwave_presence")]
    pub ha_entity_id: String,

    /// Minimum milliseconds between reporter ticks.
    #[arg(long, env, default_value_t = 500)]
    pub ha_min_interval_ms: u16,

    /// Start the reporter task automatically at startup.
    #[arg(long, env, default_value_t = false)]
    pub autostart_ha: bool,

    /// Start with engineering mode enabled.
    #[arg(long, env, default_value_t = false)]
    pub eng_mode: bool,

    /// Application log level.
    #[arg(long, env, default_value = "info")]
    pub rust_log: tracing::level_filters::LevelFilter,
}

/// Fully resolved configuration the daemon uses to open the session and,
/// optionally, start the reporter.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// UART device path.
    pub uart_path: String,
    /// UART baud rate.
    pub baud: BaudRate,
    /// Reporter configuration, present only when `ha_host`/`ha_token`
    /// were both supplied.
    pub reporter: Option<ReporterConfig>,
    /// Whether to start the reporter task automatically.
    pub autostart_ha: bool,
    /// Whether to enable engineering mode at startup.
    pub eng_mode: bool,
}

impl TryFrom<Args> for EngineConfig {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Error> {
        let baud = BaudRate::try_from(args.baud)?;

        let reporter = match (args.ha_host, args.ha_token) {
            (Some(host), Some(bearer_token)) => Some(ReporterConfig {
                host,
                port: args.ha_port,
                bearer_token,
                entity_id: args.ha_entity_id,
                min_interval_ms: args.ha_min_interval_ms,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidArgument(
                    "ha_host and ha_token must be set together".to_string(),
                ))
            }
        };

        Ok(EngineConfig {
            uart_path: args.uart,
            baud,
            reporter,
            autostart_ha: args.autostart_ha,
            eng_mode: args.eng_mode,
        })
    }
}
