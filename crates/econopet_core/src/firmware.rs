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

    core::firmware.rs

    Firmware top level. Owns every subsystem and runs the cooperative main
    loop: display sync, input routing, then the menu/CLI.

*/

use std::sync::Arc;

use econopet_common::keys::{KeyCode, KEY_BTN_LONG, KEY_BTN_SHORT};

use crate::{
    actions::SetupActions,
    cli::Cli,
    display::display_task,
    error::{FirmwareError, FwResult},
    fs::FileSystem,
    hal::{ButtonPin, Clock, ClockSource, Uart, UsbHost, Watchdog},
    hw::FIRMWARE_BANNER,
    input::{InputIo, InputRouter},
    keyboard::UsbKeyboard,
    link::Link,
    log::SharedLog,
    pet::{pet_reset, start_menu_rom, MenuRomBoot, PetIo, Roms},
    scratch::ScratchBuffer,
    state::{SharedVideo, SystemState},
    video::check_dvi_clock,
};

/// Main loop poll interval while waiting on a key.
pub const KEY_POLL_US: u64 = 1_000;

/// Board peripherals other than the PLD link and the card.
pub struct Peripherals {
    pub uart:     Box<dyn Uart + Send>,
    pub clock:    Arc<dyn Clock>,
    pub usb:      Box<dyn UsbHost + Send>,
    pub button:   Box<dyn ButtonPin + Send>,
    pub watchdog: Box<dyn Watchdog + Send>,
    pub clocks:   Box<dyn ClockSource + Send>,
}

pub struct Firmware {
    pub(crate) link:     Link,
    pub(crate) fs:       Box<dyn FileSystem>,
    pub(crate) io:       Peripherals,
    pub(crate) state:    SystemState,
    pub(crate) scratch:  ScratchBuffer,
    pub(crate) keyboard: UsbKeyboard,
    pub(crate) input:    InputRouter,
    pub(crate) cli:      Cli,
    pub(crate) roms:     Roms,
    rebooted:            bool,
}

impl Firmware {
    pub fn new(link: Link, fs: Box<dyn FileSystem>, io: Peripherals, log: SharedLog, roms: Roms) -> Self {
        Self {
            link,
            fs,
            io,
            state: SystemState::new(),
            scratch: ScratchBuffer::new(),
            keyboard: UsbKeyboard::new(),
            input: InputRouter::new(),
            cli: Cli::new(log),
            roms,
            rebooted: false,
        }
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn video(&self) -> Arc<SharedVideo> {
        self.state.video.clone()
    }

    pub fn roms(&self) -> &Roms {
        &self.roms
    }

    /// True once the watchdog has been asked to reboot the MCU.
    pub fn rebooted(&self) -> bool {
        self.rebooted
    }

    /// Bring the firmware up: verify the DVI clock, start the CLI and run the
    /// boot menu. `select` picks a configuration without waiting for a key.
    pub fn boot(&mut self, select: Option<usize>) -> FwResult<()> {
        log::warn!("{}", FIRMWARE_BANNER);
        check_dvi_clock(&*self.io.clocks)?;
        self.cli.init(&mut *self.io.uart, &mut self.state);
        self.menu_enter(select)
    }

    /// Put the PET into the menu ROM. Used by the menu and the error screen.
    pub(crate) fn start_menu_rom(&mut self, reason: MenuRomBoot) -> FwResult<()> {
        let mut io = PetIo {
            link:    &mut self.link,
            clock:   &*self.io.clock,
            fs:      &mut *self.fs,
            scratch: &mut self.scratch,
        };
        start_menu_rom(&mut io, &mut self.state, &self.roms, reason)
    }

    pub(crate) fn setup_actions(&mut self) -> SetupActions<'_> {
        SetupActions {
            link:    &mut self.link,
            fs:      &mut *self.fs,
            scratch: &mut self.scratch,
            state:   &mut self.state,
        }
    }

    pub fn display_task(&mut self) -> FwResult<()> {
        display_task(&mut self.link, &self.state, &mut *self.io.uart)?;
        Ok(())
    }

    pub fn input_task(&mut self) -> FwResult<()> {
        let mut io = InputIo {
            uart:   &mut *self.io.uart,
            clock:  &*self.io.clock,
            usb:    &mut *self.io.usb,
            button: &mut *self.io.button,
            link:   &mut self.link,
        };
        self.input
            .task(&mut io, &mut self.state, &mut self.keyboard, &mut self.cli)
    }

    pub fn getch(&mut self) -> Option<KeyCode> {
        self.input.getch(&mut self.keyboard, &self.state)
    }

    /// Keep the loop turning until a key arrives.
    pub(crate) fn wait_key(&mut self) -> FwResult<KeyCode> {
        loop {
            self.display_task()?;
            self.input_task()?;
            if let Some(key) = self.getch() {
                return Ok(key);
            }
            self.io.clock.sleep_us(KEY_POLL_US);
        }
    }

    /// Short press resets the PET, long press re-enters the menu.
    pub fn menu_task(&mut self) -> FwResult<()> {
        match self.getch() {
            Some(KEY_BTN_SHORT) => {
                log::info!("PET reset");
                pet_reset(&mut self.link, &*self.io.clock)?;
            }
            Some(KEY_BTN_LONG) => self.menu_enter(None)?,
            _ => {}
        }
        Ok(())
    }

    /// One pass of the main loop.
    pub fn step(&mut self) -> FwResult<()> {
        self.display_task()?;
        self.input_task()?;
        self.menu_task()?;
        if self.cli.take_reset_request() {
            self.reboot();
        }
        Ok(())
    }

    /// Report a failure. Fatal ones put up the error screen and reboot.
    pub fn handle_error(&mut self, err: FirmwareError) {
        if err.is_fatal() {
            self.fatal(&err);
        }
        else {
            log::warn!("{}", err);
        }
    }

    /// Run `iterations` passes of the main loop, or forever if 0, stopping
    /// early if the MCU reboots.
    pub fn run(&mut self, iterations: u64) {
        let mut count = 0;
        while !self.rebooted && (iterations == 0 || count < iterations) {
            if let Err(e) = self.step() {
                self.handle_error(e);
            }
            count += 1;
        }
    }

    pub(crate) fn reboot(&mut self) {
        log::info!("Rebooting");
        self.io.uart.flush();
        self.rebooted = true;
        self.io.watchdog.reboot();
    }
}
