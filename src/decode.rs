// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Decodes accepted data-frame payloads into [`Reading`]/[`EngineeringReading`]
//! values.
//!
//! Field offsets are relative to the start of the payload (the data-type
//! tag byte), matching the layout the sensor actually emits on the wire.
//! Everything is read with bounded-slice little-endian accessors; nothing
//! here reinterprets raw memory.

use crate::frame::Frame;

const HEAD_MARKER: u8 = 0xAA;
const DATA_TYPE_STANDARD: u8 = 0x02;
const DATA_TYPE_ENGINEERING: u8 = 0x01;

/// Number of range gates the sensor reports per-gate energy for.
pub const MAX_GATES: usize = 9;

const BASIC_FIELDS_LEN: usize = 11; // tag + marker + state + 2*(dist u16 + energy u8) + detect u16
const ENG_PAYLOAD_LEN: usize = BASIC_FIELDS_LEN + MAX_GATES + MAX_GATES;

/// Scene classification reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// No target detected.
    None,
    /// A moving target only.
    MotionOnly,
    /// A stationary target only.
    StaticOnly,
    /// Both a moving and a stationary target.
    Both,
}

impl TargetState {
    fn from_wire(byte: u8) -> Option<TargetState> {
        match byte {
            0 => Some(TargetState::None),
            1 => Some(TargetState::MotionOnly),
            2 => Some(TargetState::StaticOnly),
            3 => Some(TargetState::Both),
            _ => None,
        }
    }
}

/// A single basic sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Scene classification.
    pub target_state: TargetState,
    /// Distance to the moving target, centimeters.
    pub motion_distance_cm: u16,
    /// Distance to the stationary target, centimeters.
    pub static_distance_cm: u16,
    /// Distance to the nearest detection overall, centimeters.
    pub detection_distance_cm: u16,
    /// Motion energy, 0-100.
    pub motion_energy: u8,
    /// Static energy, 0-100.
    pub static_energy: u8,
    /// Monotonic timestamp, milliseconds, stamped when decoded.
    pub timestamp_ms: u64,
}

/// A reading augmented with per-gate energy arrays, available only while
/// engineering mode is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineeringReading {
    /// The basic reading fields.
    pub reading: Reading,
    /// Per-gate motion energy, gates 0..=8.
    pub motion_gate_energy: [u8; MAX_GATES],
    /// Per-gate static energy, gates 0..=8.
    pub static_gate_energy: [u8; MAX_GATES],
}

fn decode_basic(payload: &[u8], timestamp_ms: u64) -> Option<Reading> {
    if payload.len() < BASIC_FIELDS_LEN {
        return None;
    }
    if payload[1] != HEAD_MARKER {
        return None;
    }

    let target_state = TargetState::from_wire(payload[2])?;
    let motion_distance_cm = u16::from_le_bytes([payload[3], payload[4]]);
    let motion_energy = payload[5];
    let static_distance_cm = u16::from_le_bytes([payload[6], payload[7]]);
    let static_energy = payload[8];
    let detection_distance_cm = u16::from_le_bytes([payload[9], payload[10]]);

    Some(Reading {
        target_state,
        motion_distance_cm,
        static_distance_cm,
        detection_distance_cm,
        motion_energy,
        static_energy,
        timestamp_ms,
    })
}

/// Decode a `Frame::DataStandard` payload into a `Reading`.
///
/// Returns `None` if the data-type tag or head marker don't match what a
/// standard-report frame must carry; this never mutates any caller state,
/// it's a pure function over the payload bytes.
pub fn decode_standard(frame: &Frame, timestamp_ms: u64) -> Option<Reading> {
    let payload = match frame {
        Frame::DataStandard(p) => p,
        _ => return None,
    };
    if payload.first() != Some(&DATA_TYPE_STANDARD) {
        return None;
    }
    decode_basic(payload, timestamp_ms)
}

/// Decode a `Frame::DataEngineering` payload's basic fields only, ignoring
/// its gate-energy arrays.
///
/// Used when engineering mode is currently disabled: the sensor can still
/// tag a frame as engineering-type, but the session must not expose (or
/// even touch) stale gate-energy arrays gathered under a prior
/// engineering-mode session.
pub fn decode_engineering_basic(frame: &Frame, timestamp_ms: u64) -> Option<Reading> {
    let payload = match frame {
        Frame::DataEngineering(p) => p,
        _ => return None,
    };
    if payload.first() != Some(&DATA_TYPE_ENGINEERING) {
        return None;
    }
    decode_basic(payload, timestamp_ms)
}

/// Decode a `Frame::DataEngineering` payload into an `EngineeringReading`.
///
/// The engineering payload is treated as exactly `11 + 9 + 9` bytes;
/// anything shorter is rejected rather than partially filled.
pub fn decode_engineering(frame: &Frame, timestamp_ms: u64) -> Option<EngineeringReading> {
    let payload = match frame {
        Frame::DataEngineering(p) => p,
        _ => return None,
    };
    if payload.first() != Some(&DATA_TYPE_ENGINEERING) {
        return None;
    }
    if payload.len() < ENG_PAYLOAD_LEN {
        return None;
    }

    let reading = decode_basic(payload, timestamp_ms)?;

    let mut motion_gate_energy = [0u8; MAX_GATES];
    let mut static_gate_energy = [0u8; MAX_GATES];
    motion_gate_energy.copy_from_slice(&payload[BASIC_FIELDS_LEN..BASIC_FIELDS_LEN + MAX_GATES]);
    static_gate_energy.copy_from_slice(
        &payload[BASIC_FIELDS_LEN + MAX_GATES..BASIC_FIELDS_LEN + MAX_GATES + MAX_GATES],
    );

    Some(EngineeringReading {
        reading,
        motion_gate_energy,
        static_gate_energy,
    })
}

/// The sensor's current gate range and per-gate sensitivity, as read back by
/// `READ_CONFIG` (command `0x0061`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarConfig {
    /// Furthest motion gate currently reported, 0..=8.
    pub max_motion_gate: u8,
    /// Furthest static gate currently reported, 0..=8.
    pub max_static_gate: u8,
    /// Seconds of absence before the sensor reports `None` again.
    pub unpresence_timeout_s: u16,
    /// Per-gate motion sensitivity threshold, gates 0..=8.
    pub motion_sensitivity: [u8; MAX_GATES],
    /// Per-gate static sensitivity threshold, gates 0..=8.
    pub static_sensitivity: [u8; MAX_GATES],
}

const RADAR_CONFIG_LEN: usize = 4 + MAX_GATES + MAX_GATES;

/// Decode a `READ_CONFIG` command-response payload.
///
/// Layout: `max_motion_gate:u8 | max_static_gate:u8 | timeout_s:u16 LE |
/// motion_sensitivity[9] | static_sensitivity[9]`, matching the sensor's own
/// `mmwave_config_s` readback struct.
pub fn decode_radar_config(payload: &[u8]) -> Option<RadarConfig> {
    if payload.len() < RADAR_CONFIG_LEN {
        return None;
    }
    let max_motion_gate = payload[0];
    let max_static_gate = payload[1];
    let unpresence_timeout_s = u16::from_le_bytes([payload[2], payload[3]]);
    let mut motion_sensitivity = [0u8; MAX_GATES];
    let mut static_sensitivity = [0u8; MAX_GATES];
    motion_sensitivity.copy_from_slice(&payload[4..4 + MAX_GATES]);
    static_sensitivity.copy_from_slice(&payload[4 + MAX_GATES..4 + MAX_GATES + MAX_GATES]);
    Some(RadarConfig {
        max_motion_gate,
        max_static_gate,
        unpresence_timeout_s,
        motion_sensitivity,
        static_sensitivity,
    })
}

/// The sensor's firmware version, as read back by `READ_FIRMWARE` (command
/// `0x00A0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Build number.
    pub build: u32,
}

const FIRMWARE_VERSION_LEN: usize = 1 + 1 + 4;

/// Decode a `READ_FIRMWARE` command-response payload.
///
/// Layout: `major:u8 | minor:u8 | build:u32 LE`, matching the sensor's own
/// `mmwave_firmware_s` readback struct.
pub fn decode_firmware_version(payload: &[u8]) -> Option<FirmwareVersion> {
    if payload.len() < FIRMWARE_VERSION_LEN {
        return None;
    }
    let major = payload[0];
    let minor = payload[1];
    let build = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
    Some(FirmwareVersion { major, minor, build })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_payload(target_state: u8, motion_dist: u16, motion_energy: u8,
                         static_dist: u16, static_energy: u8, detect_dist: u16) -> Vec<u8> {
        let mut v = vec![DATA_TYPE_STANDARD, HEAD_MARKER, target_state];
        v.extend_from_slice(&motion_dist.to_le_bytes());
        v.push(motion_energy);
        v.extend_from_slice(&static_dist.to_le_bytes());
        v.push(static_energy);
        v.extend_from_slice(&detect_dist.to_le_bytes());
        v
    }

    #[test]
    fn decodes_matching_basic_fields() {
        let payload = standard_payload(1, 150, 80, 0, 0, 150);
        let frame = Frame::DataStandard(payload);
        let reading = decode_standard(&frame, 42).expect("should decode");
        assert_eq!(reading.target_state, TargetState::MotionOnly);
        assert_eq!(reading.motion_distance_cm, 150);
        assert_eq!(reading.motion_energy, 80);
        assert_eq!(reading.detection_distance_cm, 150);
        assert_eq!(reading.timestamp_ms, 42);
    }

    #[test]
    fn rejects_wrong_data_type_tag() {
        let mut payload = standard_payload(1, 150, 80, 0, 0, 150);
        payload[0] = 0x99;
        let frame = Frame::DataStandard(payload);
        assert!(decode_standard(&frame, 0).is_none());
    }

    #[test]
    fn rejects_missing_head_marker() {
        let mut payload = standard_payload(1, 150, 80, 0, 0, 150);
        payload[1] = 0x00;
        let frame = Frame::DataStandard(payload);
        assert!(decode_standard(&frame, 0).is_none());
    }

    #[test]
    fn json_boundary_scenario_all_fields_max() {
        let payload = standard_payload(3, 0xFFFF, 100, 0xFFFF, 100, 0xFFFF);
        let frame = Frame::DataStandard(payload);
        let reading = decode_standard(&frame, 1).expect("should decode");
        assert_eq!(reading.target_state, TargetState::Both);
        assert_eq!(reading.motion_distance_cm, 0xFFFF);
        assert_eq!(reading.static_energy, 100);
    }

    #[test]
    fn engineering_decode_requires_full_29_byte_payload() {
        let mut payload = standard_payload(2, 100, 55, 200, 30, 100);
        payload[0] = DATA_TYPE_ENGINEERING;
        payload.extend_from_slice(&[1, 2, 3]); // short, not the full 18 gate bytes
        let frame = Frame::DataEngineering(payload);
        assert!(decode_engineering(&frame, 0).is_none());
    }

    #[test]
    fn engineering_decode_reads_both_gate_arrays() {
        let mut payload = standard_payload(3, 100, 55, 200, 30, 100);
        payload[0] = DATA_TYPE_ENGINEERING;
        let motion_gates = [10u8, 20, 30, 40, 50, 60, 70, 80, 90];
        let static_gates = [5u8, 15, 25, 35, 45, 55, 65, 75, 85];
        payload.extend_from_slice(&motion_gates);
        payload.extend_from_slice(&static_gates);
        let frame = Frame::DataEngineering(payload);
        let eng = decode_engineering(&frame, 7).expect("should decode");
        assert_eq!(eng.motion_gate_energy, motion_gates);
        assert_eq!(eng.static_gate_energy, static_gates);
        assert_eq!(eng.reading.timestamp_ms, 7);
    }

    #[test]
    fn decode_engineering_basic_reads_basic_fields_only() {
        let mut payload = standard_payload(1, 150, 80, 200, 40, 150);
        payload[0] = DATA_TYPE_ENGINEERING;
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        payload.extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2, 1]);
        let frame = Frame::DataEngineering(payload);
        let reading = decode_engineering_basic(&frame, 5).expect("should decode");
        assert_eq!(reading.target_state, TargetState::MotionOnly);
        assert_eq!(reading.motion_distance_cm, 150);
        assert_eq!(reading.timestamp_ms, 5);
    }

    #[test]
    fn decode_engineering_basic_rejects_standard_frame() {
        let payload = standard_payload(1, 150, 80, 200, 40, 150);
        let frame = Frame::DataStandard(payload);
        assert!(decode_engineering_basic(&frame, 0).is_none());
    }

    #[test]
    fn decodes_radar_config_readback() {
        let mut payload = vec![8u8, 7u8];
        payload.extend_from_slice(&65535u16.to_le_bytes());
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        payload.extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2, 1]);
        let cfg = decode_radar_config(&payload).expect("should decode");
        assert_eq!(cfg.max_motion_gate, 8);
        assert_eq!(cfg.max_static_gate, 7);
        assert_eq!(cfg.unpresence_timeout_s, 65535);
        assert_eq!(cfg.motion_sensitivity, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(cfg.static_sensitivity, [9, 8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn decode_radar_config_rejects_short_payload() {
        assert!(decode_radar_config(&[8, 7, 0]).is_none());
    }

    #[test]
    fn decodes_firmware_version() {
        let mut payload = vec![2u8, 4u8];
        payload.extend_from_slice(&1234u32.to_le_bytes());
        let fw = decode_firmware_version(&payload).expect("should decode");
        assert_eq!(fw.major, 2);
        assert_eq!(fw.minor, 4);
        assert_eq!(fw.build, 1234);
    }

    #[test]
    fn decode_firmware_version_rejects_short_payload() {
        assert!(decode_firmware_version(&[2, 4, 0]).is_none());
    }
}
