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

    core::hal::mod.rs

    Hardware seams. Each trait stands for one peripheral of the companion
    MCU; the firmware never touches hardware except through these.

*/

use std::fmt::Arguments;

pub mod fake;
pub mod host;

pub use fake::{BufferedUart, FixedClockSource, ManualClock, ScriptedButton, ScriptedUsbHost, TestWatchdog};
pub use host::SystemClock;

/// Microsecond time since boot, and a blocking delay.
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;
    fn sleep_us(&self, us: u64);

    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

/// The stdio UART the terminal is attached to.
pub trait Uart {
    /// Returns the next received byte, if any, without blocking.
    fn read_byte(&mut self) -> Option<u8>;
    fn write(&mut self, bytes: &[u8]);
    fn flush(&mut self) {}

    fn puts(&mut self, s: &str) {
        self.write(s.as_bytes());
    }

    fn print(&mut self, args: Arguments<'_>) {
        self.puts(&args.to_string());
    }
}

pub trait Watchdog {
    /// Reset the MCU. On hardware this does not return.
    fn reboot(&mut self);
}

/// The menu button, already decoded from its active-low pin.
pub trait ButtonPin {
    fn is_pressed(&mut self) -> bool;
}

/// Measures the system clock driving the DVI serializer.
pub trait ClockSource {
    fn clk_sys_khz(&self) -> u32;
}

/// Callbacks raised by the USB host stack for HID keyboards.
pub trait UsbHidHandler {
    fn on_mount(&mut self, dev_addr: u8, instance: u8);
    fn on_unmount(&mut self, dev_addr: u8, instance: u8);
    fn on_report(&mut self, dev_addr: u8, instance: u8, report: &KeyboardReport);
}

/// A USB HID boot protocol keyboard report.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycode:  [u8; 6],
}

impl KeyboardReport {
    pub fn new(modifier: u8, keys: &[u8]) -> Self {
        let mut keycode = [0u8; 6];
        for (dst, src) in keycode.iter_mut().zip(keys) {
            *dst = *src;
        }
        Self {
            modifier,
            reserved: 0,
            keycode,
        }
    }
}

pub trait UsbHost {
    /// Service the host stack, delivering any pending callbacks to `handler`.
    fn task(&mut self, handler: &mut dyn UsbHidHandler);
    /// Send the LED output report to a keyboard.
    fn set_leds(&mut self, dev_addr: u8, instance: u8, leds: u8);
}

/// A USB host with nothing attached.
pub struct NoUsbHost;

impl UsbHost for NoUsbHost {
    fn task(&mut self, _handler: &mut dyn UsbHidHandler) {}
    fn set_leds(&mut self, _dev_addr: u8, _instance: u8, _leds: u8) {}
}

/// A menu button that is never pressed.
pub struct NoButton;

impl ButtonPin for NoButton {
    fn is_pressed(&mut self) -> bool {
        false
    }
}
