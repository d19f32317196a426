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

    core::console.rs

    Line editing for the UART console.

*/

use econopet_common::keys::{KeyCode, KEY_BACKSPACE, KEY_CR, KEY_CTRL_C, KEY_DEL, KEY_LF};

use crate::hal::Uart;

pub const CONSOLE_LINE_MAX: usize = 80;
pub const CONSOLE_PROMPT: &str = "econopet> ";

const TERM_ERASE_CHAR: &str = "\x08 \x08";

pub fn prompt(uart: &mut dyn Uart) {
    uart.puts(CONSOLE_PROMPT);
    uart.flush();
}

pub fn newline(uart: &mut dyn Uart) {
    uart.puts("\r\n");
}

/// An echoing line buffer. Holds at most `CONSOLE_LINE_MAX - 1` characters.
#[derive(Default)]
pub struct LineEditor {
    line: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }

    /// Feed one key. Returns true when the line is complete; Ctrl+C
    /// completes it empty.
    pub fn process_char(&mut self, ch: KeyCode, uart: &mut dyn Uart) -> bool {
        match ch {
            KEY_CTRL_C => {
                uart.puts("^C");
                newline(uart);
                self.line.clear();
                true
            }
            KEY_CR | KEY_LF => {
                newline(uart);
                true
            }
            KEY_BACKSPACE | KEY_DEL => {
                if self.line.pop().is_some() {
                    uart.puts(TERM_ERASE_CHAR);
                }
                false
            }
            0x20..=0x7E => {
                if self.line.len() < CONSOLE_LINE_MAX - 1 {
                    let c = ch as u8 as char;
                    self.line.push(c);
                    uart.write(&[c as u8]);
                }
                false
            }
            _ => false,
        }
    }
}
