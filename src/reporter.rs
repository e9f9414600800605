// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Publishes the latest reading to a Home Assistant `POST /api/states/<entity>`
//! endpoint over a raw TCP connection.
//!
//! The JSON body and HTTP request are built with plain string formatting
//! rather than a JSON value tree, so the key order on the wire is exactly
//! what's written here, byte for byte.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::ReporterConfig;
use crate::decode::{Reading, TargetState};
use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything the reporter can read a current reading from.
pub trait ReadingSource {
    /// Return the most recent reading, or `Err(Error::NotReady)` if none
    /// has been decoded yet.
    fn latest(&self) -> Result<Reading, Error>;
}

impl<W: tokio::io::AsyncWrite + Unpin + Send + 'static> ReadingSource for crate::session::Session<W> {
    fn latest(&self) -> Result<Reading, Error> {
        crate::session::Session::latest(self)
    }
}

/// Build the Home Assistant state JSON body for a reading.
pub fn format_state_json(reading: &Reading) -> String {
    let state = if reading.target_state != TargetState::None {
        "on"
    } else {
        "off"
    };
    format!(
        "{{\"state\":\"{}\",\
         \"attributes\":{{\
         \"friendly_name\":\"mmWave Presence\",\
         \"device_class\":\"occupancy\",\
         \"motion_energy\":{},\
         \"static_energy\":{},\
         \"motion_distance\":{},\
         \"static_distance\":{},\
         \"detection_distance\":{}\
         }}}}",
        state,
        reading.motion_energy,
        reading.static_energy,
        reading.motion_distance_cm,
        reading.static_distance_cm,
        reading.detection_distance_cm,
    )
}

/// Build the full HTTP/1.1 POST request, headers through body.
pub fn format_http_request(entity_id: &str, host: &str, port: u16, token: &str, body: &str) -> String {
    format!(
        "POST /api/states/{} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Authorization: Bearer {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        entity_id,
        host,
        port,
        token,
        body.len(),
        body,
    )
}

fn response_reports_success(response: &str) -> bool {
    response.starts_with("HTTP/1.1 200") || response.starts_with("HTTP/1.1 201")
}

/// Whether a tick with the given `current` target state is a reportable
/// edge against the last *successfully published* `previous` state. Any
/// change in `target_state` is reportable, not just a none/non-none flip
/// (e.g. `MotionOnly -> StaticOnly` is an edge even though both map to the
/// same `"on"` JSON state).
fn should_publish(previous: Option<TargetState>, current: TargetState) -> bool {
    previous != Some(current)
}

/// Ticks at `ReporterConfig::min_interval_ms`, publishing the latest state
/// whenever its `target_state` differs from the last one successfully
/// published.
pub struct Reporter<S: ReadingSource> {
    source: Arc<S>,
    config: ReporterConfig,
    previous_state: StdMutex<Option<TargetState>>,
    shutdown: Arc<AtomicBool>,
}

impl<S: ReadingSource> Reporter<S> {
    /// Construct a reporter against `source`, sharing `shutdown` with the
    /// rest of the process.
    pub fn new(source: Arc<S>, config: ReporterConfig, shutdown: Arc<AtomicBool>) -> Self {
        Reporter {
            source,
            config,
            previous_state: StdMutex::new(None),
            shutdown,
        }
    }

    /// Run the publish loop until the shutdown flag is set.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(Duration::from_millis(
            self.config.min_interval_ms.max(1) as u64,
        ));
        loop {
            interval.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let reading = match self.source.latest() {
            Ok(reading) => reading,
            Err(_) => return,
        };

        if !should_publish(*self.previous_state.lock().unwrap(), reading.target_state) {
            return;
        }

        match self.publish(&reading).await {
            Ok(()) => {
                *self.previous_state.lock().unwrap() = Some(reading.target_state);
            }
            Err(err) => {
                warn!(error = %err, "failed to publish state to home assistant");
            }
        }
    }

    #[tracing::instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    async fn publish(&self, reading: &Reading) -> Result<(), Error> {
        let body = format_state_json(reading);
        let request = format_http_request(
            &self.config.entity_id,
            &self.config.host,
            self.config.port,
            &self.config.bearer_token,
            &body,
        );

        let addr = (self.config.host.as_str(), self.config.port);
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::IoError(std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")))??;

        stream.write_all(request.as_bytes()).await?;

        let mut response = String::new();
        tokio::time::timeout(RESPONSE_TIMEOUT, stream.read_to_string(&mut response))
            .await
            .map_err(|_| Error::IoError(std::io::Error::new(std::io::ErrorKind::TimedOut, "response timed out")))??;

        if response_reports_success(&response) {
            debug!("home assistant accepted state update");
            Ok(())
        } else {
            Err(Error::ParseError(format!(
                "home assistant rejected state update: {}",
                response.lines().next().unwrap_or("")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(target_state: TargetState) -> Reading {
        Reading {
            target_state,
            motion_distance_cm: 150,
            static_distance_cm: 0,
            detection_distance_cm: 150,
            motion_energy: 80,
            static_energy: 0,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn should_publish_first_tick_with_no_previous_state() {
        assert!(should_publish(None, TargetState::None));
    }

    #[test]
    fn should_publish_is_false_for_unchanged_target_state() {
        assert!(!should_publish(Some(TargetState::MotionOnly), TargetState::MotionOnly));
    }

    #[test]
    fn should_publish_is_true_across_non_none_target_state_changes() {
        // Both MotionOnly and StaticOnly map to the same "on" JSON state, but
        // the transition between them is still a reportable edge.
        assert!(should_publish(Some(TargetState::MotionOnly), TargetState::StaticOnly));
    }

    #[test]
    fn reports_on_for_any_non_none_target_state() {
        for state in [TargetState::MotionOnly, TargetState::StaticOnly, TargetState::Both] {
            let json = format_state_json(&reading(state));
            assert!(json.starts_with("{\"state\":\"on\","), "{json}");
        }
    }

    #[test]
    fn reports_off_for_none_target_state() {
        let json = format_state_json(&reading(TargetState::None));
        assert!(json.starts_with("{\"state\":\"off\","));
    }

    #[test]
    fn json_body_has_expected_key_order_and_is_well_formed() {
        let json = format_state_json(&reading(TargetState::Both));
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
        assert!(json.contains("\"friendly_name\":\"mmWave Presence\""));
        assert!(json.contains("\"device_class\":\"occupancy\""));
        let motion_idx = json.find("\"motion_energy\"").unwrap();
        let static_idx = json.find("\"static_energy\"").unwrap();
        let detect_idx = json.find("\"detection_distance\"").unwrap();
        assert!(motion_idx < static_idx);
        assert!(static_idx < detect_idx);
    }

    #[test]
    fn json_body_handles_max_values() {
        let mut r = reading(TargetState::Both);
        r.motion_distance_cm = 65535;
        r.static_distance_cm = 65535;
        r.detection_distance_cm = 65535;
        r.motion_energy = 100;
        r.static_energy = 100;
        let json = format_state_json(&r);
        assert!(json.contains("\"motion_distance\":65535"));
        assert!(json.contains("\"static_energy\":100"));
    }

    #[test]
    fn http_request_has_expected_structure() {
        let body = format_state_json(&reading(TargetState::MotionOnly));
        let request = format_http_request(
            "binary_sensor.mmwave_presence",
            "homeassistant.local",
            8123,
            "secret-token",
            &body,
        );
        let mut lines = request.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "POST /api/states/binary_sensor.mmwave_presence HTTP/1.1"
        );
        assert!(request.contains("Host: homeassistant.local:8123\r\n"));
        assert!(request.contains("Authorization: Bearer secret-token\r\n"));
        assert!(request.contains("Content-Type: application/json\r\n"));
        assert!(request.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(request.contains("Connection: close\r\n"));
        assert!(request.ends_with(&body));
    }

    #[test]
    fn response_success_check_requires_status_line_prefix() {
        assert!(response_reports_success("HTTP/1.1 200 OK\r\n\r\n{}"));
        assert!(response_reports_success("HTTP/1.1 201 Created\r\n\r\n{}"));
        assert!(!response_reports_success("HTTP/1.1 400 Bad Request\r\n\r\n"));
        // A 200 appearing only in the body must not count as success.
        assert!(!response_reports_success(
            "HTTP/1.1 500 Internal Server Error\r\n\r\n{\"msg\":\"200 was expected\"}"
        ));
    }
}
