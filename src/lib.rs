// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! mmWave Presence Library
//!
//! This library implements the UART protocol for the HLK-LD2410 mmWave
//! presence radar and publishes occupancy state to Home Assistant.
//!
//! # Features
//!
//! - **Frame parser** - byte-at-a-time, resynchronizing Mealy machine for
//!   the sensor's framed UART protocol
//! - **Data decoder** - standard and engineering reading decode
//! - **Command arbiter** - serializes configuration command/response
//!   exchanges against the concurrent data-frame stream
//! - **Session** - owns the UART transport and the latest-reading cache
//! - **Reporter** - publishes state changes to Home Assistant over HTTP

#![warn(missing_docs)]

/// Crate-wide error type.
pub mod error;

/// Byte-stream frame parser.
pub mod frame;

/// Data-frame payload decoding.
pub mod decode;

/// Typed configuration.
pub mod config;

/// Command/response multiplexing.
pub mod arbiter;

/// UART session and latest-reading cache.
pub mod session;

/// Home Assistant state reporter.
pub mod reporter;
