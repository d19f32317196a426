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

    core::fatal.rs

    Error screen. Puts the PET into the menu ROM, shows the failure on a
    40x25 screen, waits for a key and reboots the MCU.

*/

use crate::{
    display::{window_begin, window_show},
    error::FirmwareError,
    firmware::{Firmware, KEY_POLL_US},
    hw::{MENU_COLUMNS, MENU_ROWS, VIDEO_CHAR_BUFFER_BYTE_SIZE, VIDEO_COLOR_OFFSET},
    menu::MENU_COLOR,
    pet::MenuRomBoot,
    state::{TermInputDest, TermMode, VideoSource},
    window::Window,
};

const ERROR_TITLE: &str = "E: ";

/// Lay out the error screen: a reverse video "E:" followed by the message,
/// and the OS error below it when there is one.
pub fn draw_error(window: &mut Window<'_>, err: &FirmwareError) {
    let pos = window.puts(0, ERROR_TITLE);
    window.reverse(0, 2);
    let pos = window.println(pos, format_args!("{}", err));
    if let Some(errno) = err.errno() {
        let pos = window.println(pos, format_args!(""));
        window.print(pos, format_args!("{}", errno));
    }
}

impl Firmware {
    /// Show `err` on the PET screen and the terminal, wait for any key or a
    /// button press, then reboot.
    pub fn fatal(&mut self, err: &FirmwareError) {
        log::error!("{}", err);

        if let Err(e) = self.start_menu_rom(MenuRomBoot::Error) {
            log::error!("menu ROM: {}", e);
        }
        self.state.video_source = VideoSource::Firmware;
        self.state.term_mode = TermMode::Log;
        self.state.term_input_dest = TermInputDest::ToFirmware;

        let mut screen = [0u8; MENU_COLUMNS * MENU_ROWS];
        let mut window = Window::new(&mut screen, MENU_COLUMNS, MENU_ROWS);
        window_begin(&mut *self.io.uart, &mut window);
        draw_error(&mut window, err);
        window_show(&mut *self.io.uart, &window);

        self.state.video.store(0, window.as_bytes());
        self.state
            .video
            .fill(VIDEO_COLOR_OFFSET, VIDEO_CHAR_BUFFER_BYTE_SIZE - VIDEO_COLOR_OFFSET, MENU_COLOR);
        // Lower case set for the firmware's own text.
        self.state.video.set_graphics(true);

        loop {
            if let Err(e) = self.display_task() {
                log::debug!("fatal: {}", e);
            }
            if let Err(e) = self.input_task() {
                log::debug!("fatal: {}", e);
            }
            if self.getch().is_some() {
                break;
            }
            self.io.clock.sleep_us(KEY_POLL_US);
        }
        self.reboot();
    }
}
