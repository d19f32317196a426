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

    core::cli.rs

    Debug console commands.

*/

use std::str::FromStr;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use econopet_common::keys::KeyCode;

use crate::{
    console::{self, LineEditor},
    display,
    hal::Uart,
    input::TerminalHandler,
    log::{lock_log, LogLevel, SharedLog},
    state::{SystemState, TermInputDest, TermMode},
};

#[derive(Copy, Clone, Debug, EnumIter, PartialEq, Eq)]
pub enum CliCommand {
    Help,
    Log,
    Remote,
    Reset,
}

impl CliCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CliCommand::Help => "help",
            CliCommand::Log => "log",
            CliCommand::Remote => "remote",
            CliCommand::Reset => "reset",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CliCommand::Help => "Show this help message",
            CliCommand::Log => "Show log [debug|info|warn]",
            CliCommand::Remote => "Remote control PET (Ctrl+C to exit)",
            CliCommand::Reset => "Reset the MCU",
        }
    }
}

impl FromStr for CliCommand {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        CliCommand::iter().find(|cmd| cmd.name() == s).ok_or(())
    }
}

pub struct Cli {
    editor: LineEditor,
    log: SharedLog,
    in_remote_mode: bool,
    reset_requested: bool,
}

impl Cli {
    pub fn new(log: SharedLog) -> Self {
        Self {
            editor: LineEditor::new(),
            log,
            in_remote_mode: false,
            reset_requested: false,
        }
    }

    /// Put the terminal in a known state and print the banner and prompt.
    pub fn init(&mut self, uart: &mut dyn Uart, state: &mut SystemState) {
        self.editor.clear();
        self.in_remote_mode = false;
        state.term_mode = TermMode::Cli;
        state.term_input_dest = TermInputDest::ToFirmware;

        // Full-screen scroll region, plain attributes, auto-wrap on.
        uart.puts("\x1b[r\x1b[m\x1b[?7h");
        uart.puts("\r\nEconoPET Debug Console\r\nType 'help' for available commands.\r\n\r\n");
        console::prompt(uart);
    }

    pub fn in_remote_mode(&self) -> bool {
        self.in_remote_mode
    }

    /// True once after the `reset` command ran.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    pub fn process_char(&mut self, ch: KeyCode, uart: &mut dyn Uart, state: &mut SystemState) {
        if self.editor.process_char(ch, uart) {
            let line = self.editor.line().to_string();
            self.editor.clear();
            self.execute(&line, uart, state);
            if !self.in_remote_mode {
                console::prompt(uart);
            }
        }
    }

    pub fn execute(&mut self, line: &str, uart: &mut dyn Uart, state: &mut SystemState) {
        let mut words = line.split_whitespace();
        let Some(name) = words.next()
        else {
            return;
        };
        let args = words.next();

        match name.parse::<CliCommand>() {
            Ok(CliCommand::Help) => self.cmd_help(uart),
            Ok(CliCommand::Log) => self.cmd_log(args, uart),
            Ok(CliCommand::Remote) => self.cmd_remote(uart, state),
            Ok(CliCommand::Reset) => {
                uart.puts("Resetting...\r\n");
                self.reset_requested = true;
            }
            Err(()) => {
                uart.puts(&format!("Unknown command: {}\r\n", name));
                uart.puts("Type 'help' for available commands.\r\n");
            }
        }
        uart.flush();
    }

    fn cmd_help(&self, uart: &mut dyn Uart) {
        uart.puts("Commands:\r\n");
        for cmd in CliCommand::iter() {
            uart.puts(&format!("  {:<8} - {}\r\n", cmd.name(), cmd.description()));
        }
    }

    fn cmd_log(&self, args: Option<&str>, uart: &mut dyn Uart) {
        // Anything unrecognised shows everything.
        let min_level = args.and_then(|a| a.parse::<LogLevel>().ok()).unwrap_or(LogLevel::Debug);

        // Formatted under the lock, written after it is released: a UART
        // that logs would otherwise re-enter the logger.
        let lines: Vec<String> = {
            let log = lock_log(&self.log);
            log.iter(min_level)
                .map(|(level, entry)| log.format_entry(level, entry))
                .collect()
        };
        if lines.is_empty() {
            uart.puts("(no log entries)\r\n");
            return;
        }

        for line in &lines {
            uart.puts(line);
            uart.puts("\r\n");
        }
        uart.puts(&format!("({} entries)\r\n", lines.len()));
    }

    fn cmd_remote(&mut self, uart: &mut dyn Uart, state: &mut SystemState) {
        uart.puts("[entering remote mode - Ctrl+C to exit]\r\n");
        self.in_remote_mode = true;
        state.term_mode = TermMode::Video;
        state.term_input_dest = TermInputDest::ToPet;
        display::term_begin(uart);
        display::term_refresh(uart, state);
    }

    pub fn exit_remote(&mut self, uart: &mut dyn Uart, state: &mut SystemState) {
        if !self.in_remote_mode {
            return;
        }
        self.in_remote_mode = false;
        display::term_end(uart);
        state.term_mode = TermMode::Cli;
        state.term_input_dest = TermInputDest::ToFirmware;
        uart.puts("\r\n[exited remote mode]\r\n");
        console::prompt(uart);
    }
}

impl TerminalHandler for Cli {
    fn cli_char(&mut self, ch: KeyCode, uart: &mut dyn Uart, state: &mut SystemState) {
        self.process_char(ch, uart, state);
    }

    fn exit_remote(&mut self, uart: &mut dyn Uart, state: &mut SystemState) {
        Cli::exit_remote(self, uart, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hal::{BufferedUart, ManualClock},
        log::LogBuffer,
    };
    use std::sync::{Arc, Mutex};

    fn setup() -> (Cli, SharedLog, Arc<ManualClock>, BufferedUart, SystemState) {
        let clock = Arc::new(ManualClock::new(0));
        let log: SharedLog = Arc::new(Mutex::new(LogBuffer::new(clock.clone())));
        (Cli::new(log.clone()), log, clock, BufferedUart::new(), SystemState::new())
    }

    fn type_line(cli: &mut Cli, uart: &mut BufferedUart, state: &mut SystemState, line: &str) -> String {
        for b in line.bytes() {
            cli.process_char(b as KeyCode, uart, state);
        }
        cli.process_char(b'\r' as KeyCode, uart, state);
        uart.take_output()
    }

    #[test]
    fn commands_parse_by_exact_name() {
        assert_eq!("help".parse::<CliCommand>(), Ok(CliCommand::Help));
        assert_eq!("reset".parse::<CliCommand>(), Ok(CliCommand::Reset));
        assert!("hel".parse::<CliCommand>().is_err());
        assert!("helpme".parse::<CliCommand>().is_err());
    }

    #[test]
    fn init_prints_banner_and_prompt() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        state.term_mode = TermMode::Video;
        cli.init(&mut uart, &mut state);
        let out = uart.take_output();
        assert!(out.contains("EconoPET Debug Console"));
        assert!(out.ends_with(console::CONSOLE_PROMPT));
        assert_eq!(state.term_mode, TermMode::Cli);
        assert_eq!(state.term_input_dest, TermInputDest::ToFirmware);
    }

    #[test]
    fn help_lists_commands() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        let out = type_line(&mut cli, &mut uart, &mut state, "help");
        for cmd in CliCommand::iter() {
            assert!(out.contains(cmd.name()));
        }
        assert!(out.contains("  log      - Show log [debug|info|warn]\r\n"));
        assert!(out.ends_with(console::CONSOLE_PROMPT));
    }

    #[test]
    fn unknown_command_prints_hint() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        let out = type_line(&mut cli, &mut uart, &mut state, "  bogus  arg");
        assert!(out.contains("Unknown command: bogus\r\n"));
        assert!(out.contains("Type 'help'"));
    }

    #[test]
    fn log_dumps_filtered_entries() {
        let (mut cli, log, clock, mut uart, mut state) = setup();
        {
            let mut log = lock_log(&log);
            clock.advance_ms(1);
            log.push(LogLevel::Debug, "noise");
            clock.advance_ms(1);
            log.push(LogLevel::Warn, "careful");
        }

        let out = type_line(&mut cli, &mut uart, &mut state, "log warn");
        assert!(out.contains("[   0.002] W: careful\r\n"));
        assert!(!out.contains("noise"));
        assert!(out.contains("(1 entries)\r\n"));

        let out = type_line(&mut cli, &mut uart, &mut state, "log");
        assert!(out.contains("(2 entries)\r\n"));
    }

    /// A UART that writes its own debug trace into the log.
    struct TracingUart {
        inner:     BufferedUart,
        log:       SharedLog,
        reentered: bool,
    }

    impl Uart for TracingUart {
        fn read_byte(&mut self) -> Option<u8> {
            self.inner.read_byte()
        }

        fn write(&mut self, bytes: &[u8]) {
            match self.log.try_lock() {
                Ok(mut log) => log.push(LogLevel::Debug, "uart write"),
                Err(_) => self.reentered = true,
            }
            self.inner.write(bytes);
        }
    }

    #[test]
    fn log_dump_releases_lock_before_writing() {
        let (mut cli, log, _, _, mut state) = setup();
        lock_log(&log).push(LogLevel::Warn, "careful");

        let mut uart = TracingUart {
            inner: BufferedUart::new(),
            log: log.clone(),
            reentered: false,
        };
        cli.execute("log warn", &mut uart, &mut state);
        assert!(!uart.reentered);
        let out = uart.inner.take_output();
        assert!(out.contains("W: careful\r\n"));
        assert!(out.contains("(1 entries)\r\n"));
    }

    #[test]
    fn log_when_empty() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        let out = type_line(&mut cli, &mut uart, &mut state, "log info");
        assert!(out.contains("(no log entries)"));
    }

    #[test]
    fn remote_mode_round_trip() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        let out = type_line(&mut cli, &mut uart, &mut state, "remote");
        assert!(out.contains("[entering remote mode"));
        assert!(!out.ends_with(console::CONSOLE_PROMPT));
        assert!(cli.in_remote_mode());
        assert_eq!(state.term_mode, TermMode::Video);
        assert_eq!(state.term_input_dest, TermInputDest::ToPet);

        TerminalHandler::exit_remote(&mut cli, &mut uart, &mut state);
        assert!(!cli.in_remote_mode());
        assert_eq!(state.term_mode, TermMode::Cli);
        assert_eq!(state.term_input_dest, TermInputDest::ToFirmware);
        assert!(uart.take_output().contains("[exited remote mode]"));
    }

    #[test]
    fn reset_is_requested_once() {
        let (mut cli, _, _, mut uart, mut state) = setup();
        let out = type_line(&mut cli, &mut uart, &mut state, "reset");
        assert!(out.contains("Resetting..."));
        assert!(cli.take_reset_request());
        assert!(!cli.take_reset_request());
    }
}
