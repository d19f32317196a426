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

    core::display.rs

    Keeps the firmware's character buffer and PET video RAM in step, and
    mirrors the screen to the UART terminal.

*/

use econopet_common::char_encoding::vrom_to_term;

use crate::{
    error::LinkError,
    hal::Uart,
    hw::{MENU_COLUMNS, MENU_ROWS, PET_VIDEO_RAM, VIDEO_CHAR_BUFFER_BYTE_SIZE},
    link::Link,
    state::{SystemState, TermMode, VideoSource},
    window::{Window, CH_SPACE, REVERSE_BIT},
};

pub const TERM_HOME: &str = "\x1b[H";
pub const TERM_REVERSE_OFF: &str = "\x1b[m";
pub const TERM_REVERSE_ON: &str = "\x1b[7m";
pub const TERM_CURSOR_OFF: &str = "\x1b[?25l";
pub const TERM_CURSOR_ON: &str = "\x1b[?25h";
pub const TERM_ENTER_ALTERNATE: &str = "\x1b[?1049h";
pub const TERM_EXIT_ALTERNATE: &str = "\x1b[?1049l";
pub const TERM_CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
pub const TERM_ECHO_OFF: &str = "\x1b[12l";
pub const TERM_ECHO_ON: &str = "\x1b[12h";

/// Switch the terminal to the alternate screen for full-screen output.
pub fn term_begin(uart: &mut dyn Uart) {
    for seq in [
        TERM_ENTER_ALTERNATE,
        TERM_ECHO_OFF,
        TERM_CURSOR_OFF,
        TERM_REVERSE_OFF,
        TERM_CLEAR_SCREEN,
    ] {
        uart.puts(seq);
    }
    uart.flush();
}

pub fn term_end(uart: &mut dyn Uart) {
    for seq in [TERM_REVERSE_OFF, TERM_CURSOR_ON, TERM_ECHO_ON, TERM_EXIT_ALTERNATE] {
        uart.puts(seq);
    }
    uart.flush();
}

/// Draw `width` x `height` screen cells, toggling reverse video on bit 7.
pub fn render_cells(uart: &mut dyn Uart, cells: &[u8], width: usize, height: usize) {
    let mut reverse = false;
    let mut out = String::with_capacity(width * height * 2);
    out.push_str(TERM_HOME);

    for row in cells.chunks(width).take(height) {
        for &ch in row {
            let cell_reverse = ch & REVERSE_BIT != 0;
            if reverse != cell_reverse {
                reverse = cell_reverse;
                out.push_str(if reverse { TERM_REVERSE_ON } else { TERM_REVERSE_OFF });
            }
            out.push_str(vrom_to_term(ch));
        }
        out.push_str("\r\n");
    }

    uart.puts(&out);
    uart.flush();
}

/// Render the top-left 40x25 of the character buffer to the terminal.
pub fn term_refresh(uart: &mut dyn Uart, state: &SystemState) {
    let mut cells = [0u8; MENU_COLUMNS * MENU_ROWS];
    state.video.load(0, &mut cells);
    render_cells(uart, &cells, MENU_COLUMNS, MENU_ROWS);
}

/// Once per main loop pass: pull PET video RAM into the character buffer
/// when the PET owns the screen, or push the whole buffer when the firmware
/// does. In video terminal mode the result is also drawn on the UART.
pub fn display_task(link: &mut Link, state: &SystemState, uart: &mut dyn Uart) -> Result<(), LinkError> {
    let mut buffer = [0u8; VIDEO_CHAR_BUFFER_BYTE_SIZE];
    match state.video_source {
        VideoSource::Pet => {
            let len = state.video_ram_bytes();
            link.read(PET_VIDEO_RAM, &mut buffer[..len])?;
            state.video.store(0, &buffer[..len]);
        }
        VideoSource::Firmware => {
            state.video.load(0, &mut buffer);
            link.write(PET_VIDEO_RAM, &buffer)?;
        }
    }

    if state.term_mode == TermMode::Video {
        term_refresh(uart, state);
    }
    Ok(())
}

/// Clear the terminal and the window in preparation for a full-screen panel.
pub fn window_begin(uart: &mut dyn Uart, window: &mut Window<'_>) {
    term_begin(uart);
    window.fill(CH_SPACE);
}

pub fn window_show(uart: &mut dyn Uart, window: &Window<'_>) {
    render_cells(uart, window.as_bytes(), window.width(), window.height());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hal::BufferedUart, link::SimTarget};

    #[test]
    fn render_toggles_reverse_once_per_run() {
        let mut uart = BufferedUart::new();
        // "ab" normal, "CD" reversed
        render_cells(&mut uart, &[0x01, 0x02, 0xC3, 0xC4], 4, 1);
        assert_eq!(uart.take_output(), "\x1b[Hab\x1b[7mCD\r\n");
    }

    #[test]
    fn window_renders_rows() {
        let mut uart = BufferedUart::new();
        let mut buf = [0u8; 6];
        let mut window = Window::new(&mut buf, 3, 2);
        window_begin(&mut uart, &mut window);
        window.puts(0, "Hi");
        uart.take_output();

        window_show(&mut uart, &window);
        assert_eq!(uart.take_output(), "\x1b[HHi \r\n   \r\n");
    }

    #[test]
    fn pet_source_reads_video_ram() {
        let sim = SimTarget::new();
        let mut link = Link::new(Box::new(sim.clone()));
        let mut state = SystemState::new();
        let mut uart = BufferedUart::new();

        sim.poke_range(PET_VIDEO_RAM, &[0x08, 0x09]);
        state.video_source = VideoSource::Pet;
        state.term_mode = TermMode::Cli;
        display_task(&mut link, &state, &mut uart).unwrap();

        assert_eq!(state.video.char_at(0), 0x08);
        assert_eq!(state.video.char_at(1), 0x09);
        assert!(uart.tx.is_empty());
    }

    #[test]
    fn firmware_source_writes_video_ram_and_mirrors() {
        let sim = SimTarget::new();
        let mut link = Link::new(Box::new(sim.clone()));
        let mut state = SystemState::new();
        let mut uart = BufferedUart::new();

        state.video.fill(0, VIDEO_CHAR_BUFFER_BYTE_SIZE, CH_SPACE);
        state.video.store(0, &[0x01]);
        state.video_source = VideoSource::Firmware;
        state.term_mode = TermMode::Video;
        display_task(&mut link, &state, &mut uart).unwrap();

        assert_eq!(sim.peek(PET_VIDEO_RAM), 0x01);
        assert_eq!(sim.peek(PET_VIDEO_RAM + 0xFFF), CH_SPACE);
        assert!(uart.take_output().starts_with("\x1b[Ha "));
    }
}
