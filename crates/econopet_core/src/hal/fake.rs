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

    core::hal::fake.rs

    Deterministic implementations of the hardware seams, used by tests and
    by the headless runner.

*/

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use super::{ButtonPin, Clock, ClockSource, KeyboardReport, Uart, UsbHidHandler, UsbHost, Watchdog};

/// A clock that only moves when slept on or advanced.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now: AtomicU64::new(start_us),
        }
    }

    pub fn set_us(&self, us: u64) {
        self.now.store(us, Ordering::Relaxed);
    }

    pub fn advance_us(&self, us: u64) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1_000);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    fn sleep_us(&self, us: u64) {
        self.advance_us(us);
    }
}

/// A UART backed by in-memory queues.
#[derive(Default)]
pub struct BufferedUart {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl BufferedUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            rx: input.iter().copied().collect(),
            tx: Vec::new(),
        }
    }

    pub fn push_input(&mut self, input: &[u8]) {
        self.rx.extend(input);
    }

    /// Drain everything written so far as a string.
    pub fn take_output(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.tx).into_owned();
        self.tx.clear();
        out
    }
}

impl Uart for BufferedUart {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.tx.extend_from_slice(bytes);
    }
}

#[derive(Default)]
pub struct TestWatchdog {
    pub reboots: u32,
}

impl Watchdog for TestWatchdog {
    fn reboot(&mut self) {
        self.reboots += 1;
    }
}

/// A button that replays a fixed sequence of samples, then holds the last one.
#[derive(Default)]
pub struct ScriptedButton {
    samples: VecDeque<bool>,
    last:    bool,
}

impl ScriptedButton {
    pub fn new(samples: &[bool]) -> Self {
        Self {
            samples: samples.iter().copied().collect(),
            last: false,
        }
    }
}

impl ButtonPin for ScriptedButton {
    fn is_pressed(&mut self) -> bool {
        if let Some(sample) = self.samples.pop_front() {
            self.last = sample;
        }
        self.last
    }
}

pub struct FixedClockSource(pub u32);

impl ClockSource for FixedClockSource {
    fn clk_sys_khz(&self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UsbHostEvent {
    Mount(u8, u8),
    Unmount(u8, u8),
    Report(u8, u8, KeyboardReport),
}

/// A USB host that delivers one scripted batch of events per `task()` call and
/// records every LED report sent to it.
#[derive(Default)]
pub struct ScriptedUsbHost {
    pub batches: VecDeque<Vec<UsbHostEvent>>,
    pub leds:    Vec<(u8, u8, u8)>,
}

impl ScriptedUsbHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: Vec<UsbHostEvent>) {
        self.batches.push_back(batch);
    }
}

impl UsbHost for ScriptedUsbHost {
    fn task(&mut self, handler: &mut dyn UsbHidHandler) {
        let Some(batch) = self.batches.pop_front()
        else {
            return;
        };
        for event in batch {
            match event {
                UsbHostEvent::Mount(dev, inst) => handler.on_mount(dev, inst),
                UsbHostEvent::Unmount(dev, inst) => handler.on_unmount(dev, inst),
                UsbHostEvent::Report(dev, inst, report) => handler.on_report(dev, inst, &report),
            }
        }
    }

    fn set_leds(&mut self, dev_addr: u8, instance: u8, leds: u8) {
        self.leds.push((dev_addr, instance, leds));
    }
}
