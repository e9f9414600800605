// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Serializes command/response exchanges onto the UART write side,
//! multiplexed against the unsolicited data-frame stream the poll worker
//! reads concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::time::timeout;
use tracing::warn;

use crate::config::{MaxGateConfig, SensitivityConfig};
use crate::error::Error;

const CMD_HEADER: [u8; 4] = [0xFA, 0xFB, 0xFC, 0xFD];
const CMD_TAIL: [u8; 4] = [0x01, 0x02, 0x03, 0x04];

/// Enter configuration mode.
pub const ENTER_CONFIG: u16 = 0x00FF;
const ENTER_CONFIG_BODY: [u8; 2] = [0x01, 0x00];
/// Leave configuration mode.
pub const EXIT_CONFIG: u16 = 0x00FE;
/// Set per-gate sensitivity thresholds.
pub const SET_SENSITIVITY: u16 = 0x0064;
/// Set the maximum motion/static gates and unpresence timeout.
pub const SET_MAXGATE: u16 = 0x0060;
/// Enable engineering (per-gate energy) reporting.
pub const ENG_MODE_ON: u16 = 0x0062;
/// Disable engineering reporting.
pub const ENG_MODE_OFF: u16 = 0x0063;
/// Restart the sensor module.
pub const RESTART: u16 = 0x00A3;
/// Restore the sensor's factory configuration.
pub const FACTORY_RESET: u16 = 0x00A2;
/// Read back the sensor's current gate configuration.
pub const READ_CONFIG: u16 = 0x0061;
/// Read back the sensor's firmware version.
pub const READ_FIRMWARE: u16 = 0x00A0;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
const QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Build the on-wire command frame: header, length, command code, body,
/// tail.
pub fn encode_command_frame(cmd_code: u16, body: &[u8]) -> Vec<u8> {
    let mut payload = cmd_code.to_le_bytes().to_vec();
    payload.extend_from_slice(body);
    let mut frame = CMD_HEADER.to_vec();
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&CMD_TAIL);
    frame
}

fn word_tagged_fields(fields: &[(u16, u32)]) -> Vec<u8> {
    let mut body = Vec::with_capacity(fields.len() * 6);
    for (tag, value) in fields {
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&value.to_le_bytes());
    }
    body
}

/// Encode a `SensitivityConfig` as the 18-byte word-tagged command body.
pub fn sensitivity_body(cfg: &SensitivityConfig) -> Vec<u8> {
    word_tagged_fields(&[
        (0x0000, cfg.gate as u32),
        (0x0001, cfg.motion_threshold as u32),
        (0x0002, cfg.static_threshold as u32),
    ])
}

/// Encode a `MaxGateConfig` as the 18-byte word-tagged command body.
pub fn max_gate_body(cfg: &MaxGateConfig) -> Vec<u8> {
    word_tagged_fields(&[
        (0x0000, cfg.max_motion_gate as u32),
        (0x0001, cfg.max_static_gate as u32),
        (0x0002, cfg.unpresence_timeout_s as u32),
    ])
}

type Pending = StdMutex<Option<(u16, oneshot::Sender<Vec<u8>>)>>;

/// Multiplexes configuration commands onto a UART write half, guaranteeing
/// at most one command is in flight at a time.
pub struct Arbiter<W> {
    cmd_lock: AsyncMutex<W>,
    pending: Pending,
    cmd_timeouts: AtomicU64,
}

impl<W: AsyncWrite + Unpin> Arbiter<W> {
    /// Wrap a UART write half.
    pub fn new(writer: W) -> Self {
        Arbiter {
            cmd_lock: AsyncMutex::new(writer),
            pending: StdMutex::new(None),
            cmd_timeouts: AtomicU64::new(0),
        }
    }

    /// Number of command exchanges that hit the 1s response deadline.
    pub fn cmd_timeouts(&self) -> u64 {
        self.cmd_timeouts.load(Ordering::Relaxed)
    }

    /// Called by the poll worker when it completes a command-response
    /// frame. Delivers the payload to the waiting caller if its command
    /// code matches what's expected; otherwise drops it silently.
    pub fn fulfill(&self, cmd_code: u16, payload: Vec<u8>) {
        let mut pending = self.pending.lock().unwrap();
        let matches = matches!(pending.as_ref(), Some((expected, _)) if *expected == cmd_code);
        if matches {
            if let Some((_, tx)) = pending.take() {
                let _ = tx.send(payload);
            }
        }
    }

    async fn write_and_wait(
        &self,
        writer: &mut W,
        cmd_code: u16,
        body: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap() = Some((cmd_code, tx));

        let frame = encode_command_frame(cmd_code, body);
        writer.write_all(&frame).await?;

        let outcome = timeout(RESPONSE_TIMEOUT, rx).await;
        tokio::time::sleep(QUIET_PERIOD).await;

        match outcome {
            Ok(Ok(payload)) => Ok(payload),
            _ => {
                *self.pending.lock().unwrap() = None;
                self.cmd_timeouts.fetch_add(1, Ordering::Relaxed);
                Err(Error::CmdTimeout)
            }
        }
    }

    /// Send a single command that isn't bracketed by enter/exit config
    /// (e.g. `ENG_MODE_ON`/`ENG_MODE_OFF`).
    #[tracing::instrument(skip(self, body))]
    pub async fn send(&self, cmd_code: u16, body: &[u8]) -> Result<Vec<u8>, Error> {
        let mut writer = self.cmd_lock.lock().await;
        self.write_and_wait(&mut writer, cmd_code, body).await
    }

    /// Bracket a configuration command with `enter_config`/`exit_config`,
    /// surfacing the first error among the three steps. `exit_config`
    /// always runs once `enter_config` has succeeded, even if the
    /// operation itself failed.
    #[tracing::instrument(skip(self, body))]
    pub async fn send_bracketed(&self, cmd_code: u16, body: &[u8]) -> Result<Vec<u8>, Error> {
        let mut writer = self.cmd_lock.lock().await;

        self.write_and_wait(&mut writer, ENTER_CONFIG, &ENTER_CONFIG_BODY)
            .await?;

        let result = self.write_and_wait(&mut writer, cmd_code, body).await;
        let exit_result = self.write_and_wait(&mut writer, EXIT_CONFIG, &[]).await;

        match result {
            Ok(payload) => exit_result.map(|_| payload),
            Err(err) => {
                if let Err(exit_err) = exit_result {
                    warn!(
                        error = %exit_err,
                        "exit_config failed after a failed bracketed operation"
                    );
                }
                Err(err)
            }
        }
    }
}
