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

    core::lib.rs

    Firmware core. Every subsystem of the companion MCU, written against the
    hardware traits in `hal` so it runs on the board or hosted.

*/

pub mod actions;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod console;
pub mod crtc;
pub mod display;
pub mod error;
pub mod fatal;
pub mod firmware;
pub mod fs;
pub mod hal;
pub mod hw;
pub mod input;
pub mod keyboard;
pub mod link;
pub mod log;
pub mod memtest;
pub mod menu;
pub mod pet;
pub mod registers;
pub mod scratch;
pub mod state;
pub mod term_inject;
pub mod video;
pub mod window;

pub use crate::{
    error::{FirmwareError, FwResult},
    firmware::{Firmware, Peripherals},
};
