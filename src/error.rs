// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{fmt, io};

/// Errors produced by the radar engine.
#[derive(Debug)]
pub enum Error {
    /// No valid frame has been decoded yet.
    NotReady,
    /// A frame or command response could not be parsed.
    ParseError(String),
    /// A caller supplied a value outside its valid range.
    InvalidArgument(String),
    /// A command was sent but no response arrived within the deadline.
    CmdTimeout,
    /// I/O error from the UART or network transport.
    IoError(io::Error),
    /// The requested data requires a mode that isn't currently enabled.
    Unconfigured,
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NotReady => write!(f, "no reading available yet"),
            Error::ParseError(msg) => write!(f, "parse error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::CmdTimeout => write!(f, "command timed out waiting for a response"),
            Error::IoError(err) => write!(f, "io error: {}", err),
            Error::Unconfigured => write!(f, "requested mode is not enabled"),
        }
    }
}
