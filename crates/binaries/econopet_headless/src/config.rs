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

    headless::config.rs

    Runner configuration. Read from a TOML file, then overlaid with any
    command line arguments.

*/

use std::path::{Path, PathBuf};

use anyhow::Context;
use bpaf::Bpaf;
use serde_derive::Deserialize;

use econopet_core::{hw::DVI_BIT_CLOCK_KHZ, memtest::OnFailure};

pub const DEFAULT_CONFIG_PATH: &str = "econopet.toml";

/// The simulated board.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Board {
    /// Directory standing in for the SD card.
    pub sd_root: PathBuf,
    /// Status register as read from the PLD: bit 0 graphics, bit 1 CRT,
    /// bit 2 keyboard DIP switch.
    pub status: u8,
    pub clk_sys_khz: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            sd_root: PathBuf::from("sd"),
            status: 0b100,
            clk_sys_khz: DVI_BIT_CLOCK_KHZ,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MemTestMode {
    #[default]
    Off,
    Abort,
    Continue,
}

impl MemTestMode {
    pub fn on_failure(self) -> Option<OnFailure> {
        match self {
            MemTestMode::Off => None,
            MemTestMode::Abort => Some(OnFailure::Abort),
            MemTestMode::Continue => Some(OnFailure::Continue),
        }
    }
}

impl std::str::FromStr for MemTestMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "off" => Ok(MemTestMode::Off),
            "abort" => Ok(MemTestMode::Abort),
            "continue" => Ok(MemTestMode::Continue),
            _ => Err(format!("Bad value for memtest: {}", s)),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Runner {
    /// Main loop passes before exiting. 0 runs forever.
    pub iterations: u64,
    /// Configuration to run without showing the menu.
    pub select: Option<usize>,
    /// Run the scanline renderer on its own thread.
    pub renderer: bool,
    pub memtest: MemTestMode,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            iterations: 0,
            select: None,
            renderer: true,
            memtest: MemTestMode::Off,
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeadlessConfig {
    pub board:  Board,
    pub runner: Runner,
}

#[derive(Debug, Default, Bpaf)]
#[bpaf(options, version, generate(cli_args))]
pub struct CmdLineArgs {
    #[bpaf(long("config_file"), long("configfile"))]
    pub config_file: Option<PathBuf>,

    #[bpaf(long("sd_root"))]
    pub sd_root: Option<PathBuf>,

    #[bpaf(long)]
    pub status: Option<u8>,

    #[bpaf(long)]
    pub select: Option<usize>,

    #[bpaf(long)]
    pub iterations: Option<u64>,

    #[bpaf(long("no_renderer"), switch)]
    pub no_renderer: bool,

    #[bpaf(long)]
    pub memtest: Option<MemTestMode>,
}

impl HeadlessConfig {
    pub fn overlay(&mut self, shell_args: CmdLineArgs) {
        if let Some(sd_root) = shell_args.sd_root {
            self.board.sd_root = sd_root;
        }
        if let Some(status) = shell_args.status {
            self.board.status = status;
        }
        if let Some(select) = shell_args.select {
            self.runner.select = Some(select);
        }
        if let Some(iterations) = shell_args.iterations {
            self.runner.iterations = iterations;
        }
        if let Some(memtest) = shell_args.memtest {
            self.runner.memtest = memtest;
        }
        self.runner.renderer &= !shell_args.no_renderer;
    }
}

pub fn read_config(toml_string: impl AsRef<str>, shell_args: CmdLineArgs) -> Result<HeadlessConfig, anyhow::Error> {
    let mut toml_args: HeadlessConfig = toml::from_str(toml_string.as_ref())?;

    // Command line arguments override config file arguments
    toml_args.overlay(shell_args);
    Ok(toml_args)
}

/// Read the configuration named on the command line, or `default_path`. A
/// missing default file leaves every setting at its default.
pub fn read_config_file<P>(default_path: P) -> Result<HeadlessConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    log::debug!("Reading command line arguments...");
    let shell_args = cli_args().run();

    let toml_string = if let Some(configfile_path) = shell_args.config_file.as_ref() {
        std::fs::read_to_string(configfile_path)
            .with_context(|| format!("reading {}", configfile_path.display()))?
    }
    else if default_path.as_ref().exists() {
        std::fs::read_to_string(default_path.as_ref())
            .with_context(|| format!("reading {}", default_path.as_ref().display()))?
    }
    else {
        log::debug!("{} not found, using defaults", default_path.as_ref().display());
        String::new()
    };

    read_config(toml_string, shell_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = read_config("", CmdLineArgs::default()).unwrap();
        assert_eq!(config, HeadlessConfig::default());
        assert_eq!(config.board.clk_sys_khz, DVI_BIT_CLOCK_KHZ);
        assert!(config.runner.renderer);
        assert_eq!(config.runner.memtest.on_failure(), None);
    }

    #[test]
    fn file_settings() {
        let config = read_config(
            r#"
[board]
sd_root = "/tmp/card"
status = 0x03

[runner]
iterations = 500
select = 1
renderer = false
memtest = "continue"
"#,
            CmdLineArgs::default(),
        )
        .unwrap();
        assert_eq!(config.board.sd_root, PathBuf::from("/tmp/card"));
        assert_eq!(config.board.status, 3);
        assert_eq!(config.runner.iterations, 500);
        assert_eq!(config.runner.select, Some(1));
        assert!(!config.runner.renderer);
        assert_eq!(config.runner.memtest.on_failure(), Some(OnFailure::Continue));
    }

    #[test]
    fn command_line_wins() {
        let args = CmdLineArgs {
            sd_root: Some(PathBuf::from("card")),
            select: Some(0),
            no_renderer: true,
            memtest: Some(MemTestMode::Abort),
            ..Default::default()
        };
        let config = read_config("[runner]\nselect = 2\niterations = 9\n", args).unwrap();
        assert_eq!(config.board.sd_root, PathBuf::from("card"));
        assert_eq!(config.runner.select, Some(0));
        assert_eq!(config.runner.iterations, 9);
        assert!(!config.runner.renderer);
        assert_eq!(config.runner.memtest, MemTestMode::Abort);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(read_config("[board]\nstatus = \"high\"\n", CmdLineArgs::default()).is_err());
        assert!("sometimes".parse::<MemTestMode>().is_err());
    }
}
