// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Owns the UART transport and the decoded-reading cache, and exposes the
//! typed operations the rest of the process calls.
//!
//! A single background task (the poll worker) owns the read half of the
//! serial port and the [`Parser`] instance; it is the sole writer of the
//! `latest`/`latest_engineering` cells and the frame counters. Everything
//! else reads through `&Session`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, warn};

use crate::arbiter::{
    self, max_gate_body, sensitivity_body, Arbiter, ENG_MODE_OFF, ENG_MODE_ON, FACTORY_RESET,
    READ_CONFIG, READ_FIRMWARE, RESTART, SET_MAXGATE, SET_SENSITIVITY,
};
use crate::config::{BaudRate, MaxGateConfig, SensitivityConfig};
use crate::decode::{self, EngineeringReading, FirmwareVersion, RadarConfig, Reading};
use crate::error::Error;
use crate::frame::{FeedOutcome, Frame, Parser};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Frame-level counters exposed for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Frames successfully parsed and decoded.
    pub frames_ok: u64,
    /// Frames discarded by the parser (bad length, bad tail, family
    /// mismatch).
    pub frames_err: u64,
    /// Command exchanges that hit the 1s response deadline.
    pub cmd_timeouts: u64,
}

/// A live connection to an HLK-LD2410 sensor over UART.
///
/// Generic over the arbiter's write-half type so the frame-dispatch and
/// command logic can be exercised against an in-memory duplex in tests
/// without opening a real serial port.
pub struct Session<W: AsyncWrite + Unpin + Send + 'static> {
    latest: StdMutex<Option<Reading>>,
    latest_engineering: StdMutex<Option<EngineeringReading>>,
    eng_mode: AtomicBool,
    arbiter: Arc<Arbiter<W>>,
    frames_ok: AtomicU64,
    frames_err: AtomicU64,
    shutdown: Arc<AtomicBool>,
}

/// A session opened against a real UART.
pub type UartSession = Session<WriteHalf<SerialStream>>;

impl<W: AsyncWrite + Unpin + Send + 'static> Session<W> {
    fn new(arbiter: Arbiter<W>, eng_mode: bool, shutdown: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Session {
            latest: StdMutex::new(None),
            latest_engineering: StdMutex::new(None),
            eng_mode: AtomicBool::new(eng_mode),
            arbiter: Arc::new(arbiter),
            frames_ok: AtomicU64::new(0),
            frames_err: AtomicU64::new(0),
            shutdown,
        })
    }

    /// The most recent standard reading, if any frame has been decoded yet.
    pub fn latest(&self) -> Result<Reading, Error> {
        self.latest.lock().unwrap().ok_or(Error::NotReady)
    }

    /// The most recent engineering reading. Returns `Unconfigured` unless
    /// engineering mode is currently enabled.
    pub fn latest_engineering(&self) -> Result<EngineeringReading, Error> {
        if !self.eng_mode.load(Ordering::Relaxed) {
            return Err(Error::Unconfigured);
        }
        self.latest_engineering.lock().unwrap().ok_or(Error::NotReady)
    }

    /// Whether engineering mode is currently believed to be enabled.
    pub fn eng_mode(&self) -> bool {
        self.eng_mode.load(Ordering::Relaxed)
    }

    /// Current frame and command counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_ok: self.frames_ok.load(Ordering::Relaxed),
            frames_err: self.frames_err.load(Ordering::Relaxed),
            cmd_timeouts: self.arbiter.cmd_timeouts(),
        }
    }

    /// Signal the poll worker to stop at its next iteration.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// The shared shutdown flag, so other tasks (e.g. the reporter) can be
    /// stopped together with the poll worker.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Apply per-gate sensitivity thresholds.
    pub async fn set_sensitivity(&self, cfg: SensitivityConfig) -> Result<(), Error> {
        self.arbiter
            .send_bracketed(SET_SENSITIVITY, &sensitivity_body(&cfg))
            .await
            .map(|_| ())
    }

    /// Apply the maximum gate range and unpresence timeout.
    pub async fn set_max_gates(&self, cfg: MaxGateConfig) -> Result<(), Error> {
        self.arbiter
            .send_bracketed(SET_MAXGATE, &max_gate_body(&cfg))
            .await
            .map(|_| ())
    }

    /// Enable or disable engineering (per-gate energy) reporting.
    pub async fn set_eng_mode(&self, enabled: bool) -> Result<(), Error> {
        let cmd = if enabled { ENG_MODE_ON } else { ENG_MODE_OFF };
        self.arbiter.send(cmd, &[]).await?;
        self.eng_mode.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Restart the sensor module, bracketed by enter/exit config like the
    /// other configuration operations.
    pub async fn restart(&self) -> Result<(), Error> {
        self.arbiter.send_bracketed(RESTART, &[]).await.map(|_| ())
    }

    /// Restore the sensor's factory configuration.
    pub async fn factory_reset(&self) -> Result<(), Error> {
        self.arbiter.send_bracketed(FACTORY_RESET, &[]).await.map(|_| ())
    }

    /// Read back the sensor's current gate configuration.
    pub async fn get_config(&self) -> Result<RadarConfig, Error> {
        let payload = self.arbiter.send_bracketed(READ_CONFIG, &[]).await?;
        decode::decode_radar_config(&payload)
            .ok_or_else(|| Error::ParseError("short READ_CONFIG response".to_string()))
    }

    /// Read back the sensor's firmware version.
    pub async fn get_firmware(&self) -> Result<FirmwareVersion, Error> {
        let payload = self.arbiter.send_bracketed(READ_FIRMWARE, &[]).await?;
        decode::decode_firmware_version(&payload)
            .ok_or_else(|| Error::ParseError("short READ_FIRMWARE response".to_string()))
    }

    fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::CommandResponse { cmd_code, payload } => {
                self.arbiter.fulfill(cmd_code, payload);
            }
            Frame::DataStandard(_) => {
                if let Some(reading) = decode::decode_standard(&frame, now_ms()) {
                    *self.latest.lock().unwrap() = Some(reading);
                } else {
                    debug!("data-standard frame failed to decode");
                }
            }
            Frame::DataEngineering(_) => {
                if self.eng_mode.load(Ordering::Relaxed) {
                    if let Some(eng) = decode::decode_engineering(&frame, now_ms()) {
                        *self.latest.lock().unwrap() = Some(eng.reading);
                        *self.latest_engineering.lock().unwrap() = Some(eng);
                    } else {
                        debug!("data-engineering frame failed to decode");
                    }
                } else if let Some(reading) = decode::decode_engineering_basic(&frame, now_ms()) {
                    // eng_mode is off: decode basic fields only, leave any
                    // previously-captured gate arrays untouched.
                    *self.latest.lock().unwrap() = Some(reading);
                } else {
                    debug!("data-engineering frame failed to decode");
                }
            }
        }
    }
}

#[tracing::instrument(skip_all)]
async fn poll_worker<R, W>(mut reader: R, session: Arc<Session<W>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut parser = Parser::new();
    let mut buf = [0u8; 1];
    loop {
        if session.shutdown.load(Ordering::Relaxed) {
            return;
        }
        match reader.read(&mut buf).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "uart read failed, stopping poll worker");
                return;
            }
        }
        match parser.feed(buf[0]) {
            FeedOutcome::Pending => {}
            FeedOutcome::Error => {
                session.frames_err.fetch_add(1, Ordering::Relaxed);
            }
            FeedOutcome::Complete(frame) => {
                session.frames_ok.fetch_add(1, Ordering::Relaxed);
                session.handle_frame(frame);
            }
        }
    }
}

impl UartSession {
    /// Open the UART at `path`/`baud` and start the poll worker.
    ///
    /// Returns the session handle and a shared shutdown flag the caller
    /// can flip to stop the background task.
    pub async fn open(path: &str, baud: BaudRate, eng_mode: bool) -> Result<Arc<Self>, Error> {
        let port = tokio_serial::new(path, baud.as_u32())
            .open_native_async()
            .map_err(|err| Error::IoError(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        let (read_half, write_half) = split(port);

        let shutdown = Arc::new(AtomicBool::new(false));
        let arbiter = Arbiter::new(write_half);
        let session = Session::new(arbiter, eng_mode, shutdown);

        let worker_session = session.clone();
        tokio::spawn(async move {
            poll_worker(read_half, worker_session).await;
        });

        Ok(session)
    }
}
