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

    core::window.rs

    Bounded character window over a caller-provided screen buffer. Positions
    are byte offsets into the window; every mutation is range checked.

*/

use std::fmt::{self, Write};

use econopet_common::char_encoding::ascii_to_vrom;

pub const CH_SPACE: u8 = 0x20;
pub const REVERSE_BIT: u8 = 0x80;

pub struct Window<'a> {
    buf:    &'a mut [u8],
    width:  usize,
    height: usize,
}

impl<'a> Window<'a> {
    pub fn new(buf: &'a mut [u8], width: usize, height: usize) -> Self {
        assert!(width * height <= buf.len(), "window {}x{} exceeds its buffer", width, height);
        let len = width * height;
        Self {
            buf: &mut buf[..len],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn end(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }

    fn check_start(&self, start: usize) {
        assert!(start < self.end(), "window offset {} out of bounds", start);
    }

    fn check_length(&self, start: usize, length: usize) {
        assert!(start + length <= self.end(), "window span {}+{} out of bounds", start, length);
    }

    pub fn xy(&self, x: usize, y: usize) -> usize {
        assert!(x < self.width, "x={} outside window", x);
        assert!(y < self.height, "y={} outside window", y);
        y * self.width + x
    }

    pub fn chars_remaining(&self, start: usize) -> usize {
        self.check_start(start);
        self.end() - start
    }

    pub fn current_row(&self, start: usize) -> usize {
        self.check_start(start);
        start / self.width
    }

    pub fn fill(&mut self, c: u8) {
        self.buf.fill(c);
    }

    pub fn hline(&mut self, start: usize, length: usize, c: u8) -> usize {
        if length == 0 {
            return start;
        }
        self.check_start(start);
        self.check_length(start, length);
        self.buf[start..start + length].fill(c);
        start + length
    }

    /// A line with distinct end caps, e.g. box corners around a run of edges.
    pub fn hline3(&mut self, start: usize, length: usize, left: u8, middle: u8, right: u8) -> usize {
        assert!(length >= 2, "hline3 needs room for both caps");
        self.check_start(start);
        self.check_length(start, length);
        self.buf[start] = left;
        self.buf[start + 1..start + length - 1].fill(middle);
        self.buf[start + length - 1] = right;
        start + length
    }

    pub fn fill_rect(&mut self, start: usize, width: usize, height: usize, c: u8) -> usize {
        let mut pos = start;
        for _ in 0..height {
            self.hline(pos, width, c);
            pos += self.width;
        }
        pos
    }

    /// Write up to `length` characters of ASCII text, stopping early at the
    /// end of the window.
    pub fn puts_n(&mut self, start: usize, s: &str, length: usize) -> usize {
        let mut pos = start;
        for byte in s.bytes().take(length) {
            if pos >= self.end() {
                log::debug!("window: '{}' truncated", s);
                break;
            }
            self.buf[pos] = ascii_to_vrom(byte);
            pos += 1;
        }
        pos
    }

    pub fn puts(&mut self, start: usize, s: &str) -> usize {
        self.puts_n(start, s, usize::MAX)
    }

    pub fn print(&mut self, start: usize, args: fmt::Arguments<'_>) -> usize {
        let mut text = String::new();
        let _ = text.write_fmt(args);
        self.puts(start, &text)
    }

    /// Print, then move to the start of the following row.
    pub fn println(&mut self, start: usize, args: fmt::Arguments<'_>) -> usize {
        let pos = self.print(start, args);
        if pos >= self.end() {
            return self.end();
        }
        let row = self.current_row(pos) + 1;
        if row >= self.height {
            return self.end();
        }
        self.xy(0, row)
    }

    /// Toggle reverse video over a run of cells.
    pub fn reverse(&mut self, start: usize, length: usize) -> usize {
        if length == 0 {
            return start;
        }
        self.check_start(start);
        self.check_length(start, length);
        for cell in &mut self.buf[start..start + length] {
            *cell ^= REVERSE_BIT;
        }
        start + length
    }
}
