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

    core::config::mod.rs

    Machine configurations. /config.yaml lists named configurations, each a
    sequence of setup actions delivered to a SetupSink as they are parsed.

*/

use std::{fmt, io::Read, str::FromStr};

use thiserror::Error;

use crate::{
    error::{FsError, FwResult},
    fs::{errno_of, sd_open, FileSystem},
    state::{DisplayColumns, PetKeyboardModel, PetVideoType},
};

mod parser;

pub use parser::parse_config;

pub const CONFIG_PATH: &str = "/config.yaml";
pub const CONFIG_NAME_MAX: usize = 40;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("'{file}' at line {line}, column {column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Branch conditions for `if:` blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Graphics,
    Business,
    Crtc,
    Fixed,
}

impl Condition {
    pub fn holds(self, model: PetKeyboardModel, video: PetVideoType) -> bool {
        match self {
            Condition::Graphics => model == PetKeyboardModel::Graphics,
            Condition::Business => model == PetKeyboardModel::Business,
            Condition::Crtc => video == PetVideoType::Crtc,
            Condition::Fixed => video == PetVideoType::Fixed,
        }
    }
}

impl FromStr for Condition {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "graphics" => Ok(Condition::Graphics),
            "business" => Ok(Condition::Business),
            "crtc" => Ok(Condition::Crtc),
            "fixed" => Ok(Condition::Fixed),
            _ => Err(format!("Unknown condition '{}'.", s)),
        }
    }
}

/// Options carried by a `set` action. Keys left out take their defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigOptions {
    pub columns: DisplayColumns,
    pub video_ram_mask: u8,
    pub usb_keymap: Option<String>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            columns: DisplayColumns::Forty,
            video_ram_mask: 0,
            usb_keymap: None,
        }
    }
}

impl ConfigOptions {
    pub fn set_columns(&mut self, columns: u32) -> Result<(), ConfigError> {
        self.columns = DisplayColumns::from_count(columns)
            .ok_or_else(|| ConfigError::InvalidOption(format!("columns must be 40 or 80, not {}", columns)))?;
        Ok(())
    }

    /// 1, 2, 3 or 4 KiB of video RAM. 3 KiB is 1 KiB of characters plus the
    /// attribute half.
    pub fn set_video_ram_kb(&mut self, kb: u32) -> Result<(), ConfigError> {
        if !(1..=4).contains(&kb) {
            return Err(ConfigError::InvalidOption(format!(
                "video-ram-kb must be 1, 2, 3 or 4, not {}",
                kb
            )));
        }
        self.video_ram_mask = (kb - 1) as u8;
        Ok(())
    }

    pub fn video_ram_bytes(&self) -> usize {
        (self.video_ram_mask as usize + 1) * 1024
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadFile {
    pub file: String,
    pub address: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Load(Vec<LoadFile>),
    Patch { address: u32, bytes: Vec<u8> },
    Copy { source: u32, destination: u32, length: u32 },
    Set(ConfigOptions),
    FixChecksum { start: u32, end: u32, fix_addr: u32, checksum: u8 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Load(_) => write!(f, "load"),
            Action::Patch { .. } => write!(f, "patch"),
            Action::Copy { .. } => write!(f, "copy"),
            Action::Set(_) => write!(f, "set"),
            Action::FixChecksum { .. } => write!(f, "fix-checksum"),
        }
    }
}

/// Receives the configurations as they are parsed.
pub trait SetupSink {
    fn on_enter_config(&mut self) {}
    fn on_exit_config(&mut self, _name: &str) {}

    /// Model flags `if:` conditions are tested against.
    fn pet_model(&self) -> (PetKeyboardModel, PetVideoType);

    fn on_load(&mut self, file: &str, address: u32) -> FwResult<()>;
    fn on_patch(&mut self, address: u32, bytes: &[u8]) -> FwResult<()>;
    fn on_copy(&mut self, source: u32, destination: u32, length: u32) -> FwResult<()>;
    fn on_set_options(&mut self, options: &ConfigOptions) -> FwResult<()>;
    fn on_set_keymap(&mut self, file: &str) -> FwResult<()>;
    fn on_fix_checksum(&mut self, start: u32, end: u32, fix_addr: u32, expected: u8) -> FwResult<()>;
}

/// Deliver one action to a sink.
pub fn run_action(sink: &mut dyn SetupSink, action: &Action) -> FwResult<()> {
    match action {
        Action::Load(files) => {
            for f in files {
                sink.on_load(&f.file, f.address)?;
            }
            Ok(())
        }
        Action::Patch { address, bytes } => sink.on_patch(*address, bytes),
        Action::Copy {
            source,
            destination,
            length,
        } => sink.on_copy(*source, *destination, *length),
        Action::Set(options) => sink.on_set_options(options),
        Action::FixChecksum {
            start,
            end,
            fix_addr,
            checksum,
        } => sink.on_fix_checksum(*start, *end, *fix_addr, *checksum),
    }
}

/// Parse an integer written as decimal or with a `0x`, `0o` or `0b` prefix.
pub fn parse_int(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let (digits, radix) = match t.get(..2) {
        Some("0x") | Some("0X") => (&t[2..], 16),
        Some("0o") | Some("0O") => (&t[2..], 8),
        Some("0b") | Some("0B") => (&t[2..], 2),
        _ => (t, 10),
    };
    u32::from_str_radix(&digits.replace('_', ""), radix).map_err(|_| format!("Invalid integer '{}'", s))
}

/// Decode pairs of hex digits. Whitespace may separate the pairs.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for word in s.split_whitespace() {
        if word.len() % 2 != 0 {
            return Err(format!("Odd number of hex digits in '{}'", word));
        }
        for i in (0..word.len()).step_by(2) {
            let pair = word.get(i..i + 2).ok_or_else(|| format!("Invalid hex '{}'", word))?;
            bytes.push(u8::from_str_radix(pair, 16).map_err(|_| format!("Invalid hex '{}'", pair))?);
        }
    }
    Ok(bytes)
}

/// Read a configuration document from the card.
pub fn read_config_file(fs: &mut dyn FileSystem, path: &str) -> Result<Vec<u8>, ConfigError> {
    let mut file = sd_open(fs, path)?;
    let mut data = Vec::new();
    if let Err(e) = file.read_to_end(&mut data) {
        return Err(FsError::Read {
            path: path.to_string(),
            errno: errno_of(&e),
        }
        .into());
    }
    Ok(data)
}

/// Read and parse a configuration file. `target` selects the configuration
/// whose actions are delivered; `None` only enumerates names.
pub fn parse_config_file(
    fs: &mut dyn FileSystem,
    path: &str,
    sink: &mut dyn SetupSink,
    target: Option<usize>,
) -> FwResult<()> {
    let data = read_config_file(fs, path)?;
    parse_config(path, &data, sink, target)
}
