/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    core::error.rs

    Error types shared across firmware subsystems.

*/

use std::fmt;

use thiserror::Error;

use crate::{config::ConfigError, memtest::MemTestError, video::VideoError};

#[derive(Error, Debug, PartialEq)]
pub enum LinkError {
    #[error("link address ${0:06X} is outside the 20-bit address space")]
    AddressRange(u32),
    #[error("link transfer of {0} bytes is not a valid command frame")]
    FrameLength(usize),
    #[error("link target stayed stalled")]
    Stalled,
    #[error("link target fault: {0}")]
    Target(String),
}

/// An OS-level cause carried alongside a filesystem error, shown on the fatal screen.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrnoInfo {
    pub code: i32,
    pub description: String,
}

impl fmt::Display for ErrnoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}): {}", self.code, self.description)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum FsError {
    #[error("path '{0}' must be absolute")]
    NotAbsolute(String),
    #[error("unable to open '{path}'")]
    Open { path: String, errno: Option<ErrnoInfo> },
    #[error("error reading '{path}'")]
    Read { path: String, errno: Option<ErrnoInfo> },
}

impl FsError {
    pub fn errno(&self) -> Option<&ErrnoInfo> {
        match self {
            FsError::Open { errno, .. } | FsError::Read { errno, .. } => errno.as_ref(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    MemTest(#[from] MemTestError),
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error("Incorrect 'clk_sys' frequency. Expected {expected} +/-{tolerance} kHz, but got {actual} kHz.")]
    ClockMismatch { expected: u32, actual: u32, tolerance: u32 },
    #[error("Too many USB keyboards (max {0}).")]
    TooManyKeyboards(usize),
    #[error("Checksum fix failed: ${start:04X}-${end:04X} sums to ${actual:02X}, expected ${expected:02X}.")]
    ChecksumVerify { start: u32, end: u32, expected: u8, actual: u8 },
}

impl FirmwareError {
    /// Fatal errors stop the firmware and put up the error screen. The rest
    /// are reported and the firmware carries on.
    pub fn is_fatal(&self) -> bool {
        match self {
            // The card is gone or unreadable.
            FirmwareError::Config(ConfigError::Fs(_)) => true,
            FirmwareError::Config(_) | FirmwareError::ChecksumVerify { .. } => false,
            FirmwareError::MemTest(_) => false,
            _ => true,
        }
    }

    pub fn errno(&self) -> Option<&ErrnoInfo> {
        match self {
            FirmwareError::Fs(e) => e.errno(),
            FirmwareError::Config(ConfigError::Fs(e)) => e.errno(),
            _ => None,
        }
    }
}

pub type FwResult<T> = Result<T, FirmwareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_mismatch_message() {
        let err = FirmwareError::ClockMismatch {
            expected: 270_000,
            actual: 250_000,
            tolerance: 1,
        };
        assert_eq!(
            err.to_string(),
            "Incorrect 'clk_sys' frequency. Expected 270000 +/-1 kHz, but got 250000 kHz."
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn errno_is_surfaced_from_fs_errors() {
        let err: FirmwareError = FsError::Open {
            path: "/roms/basic.bin".into(),
            errno: Some(ErrnoInfo {
                code: 2,
                description: "No such file or directory".into(),
            }),
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.errno().map(|e| e.to_string()).unwrap(), "(2): No such file or directory");
        assert_eq!(err.to_string(), "unable to open '/roms/basic.bin'");
    }

    #[test]
    fn unreadable_config_is_fatal_but_bad_config_is_not() {
        let missing = FirmwareError::from(ConfigError::Fs(FsError::Open {
            path: "/config.yaml".into(),
            errno: None,
        }));
        assert!(missing.is_fatal());
        assert!(!FirmwareError::from(ConfigError::InvalidOption("columns: 64".into())).is_fatal());
    }
}
