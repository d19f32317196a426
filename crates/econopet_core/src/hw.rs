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

    core::hw.rs

    Board constants: link address map, video timing and frame geometry.
    Values mirror the PLD's register decoding and the DVI mode the
    renderer produces.

*/

use const_format::formatcp;

pub const FIRMWARE_NAME: &str = "EconoPET";
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FIRMWARE_BANNER: &str = formatcp!("{} v{}", FIRMWARE_NAME, FIRMWARE_VERSION);

// Link address space.
pub const LINK_ADDR_BITS: u32 = 20;
pub const LINK_ADDR_MASK: u32 = (1 << LINK_ADDR_BITS) - 1;

pub const ADDR_REG: u32 = 0b010 << 17;
pub const REG_STATUS: u32 = ADDR_REG;
pub const REG_CPU: u32 = ADDR_REG + 1;
pub const REG_VIDEO: u32 = ADDR_REG + 2;
pub const ADDR_KBD: u32 = 0b011 << 17;
pub const ADDR_CRTC: u32 = 0b0101 << 16;
pub const ADDR_CHAR_ROM: u32 = 0x68000;

pub const PET_VIDEO_RAM: u32 = 0x8000;
pub const PET_MENU_ROM: u32 = 0xFF00;

// The memory test covers the PET's SRAM.
pub const RAM_ADDR_MIN: u32 = 0x00000;
pub const RAM_ADDR_MAX: u32 = 0x1FFFF;

pub const KEY_COL_COUNT: usize = 10;
pub const CRTC_REG_COUNT: usize = 14;

// Firmware-side character buffer. The upper half holds color attributes.
pub const VIDEO_CHAR_BUFFER_BYTE_SIZE: usize = 0x1000;
pub const VIDEO_COLOR_OFFSET: usize = 0x800;

pub const SCRATCH_BUFFER_SIZE: usize = 4096;

// DVI output. The serializer emits two pixels per 32-bit word.
pub const FRAME_WIDTH: usize = 720;
pub const FRAME_HEIGHT: usize = 480 / 2;
pub const FONT_WIDTH: usize = 8;
pub const FONT_HEIGHT: usize = 8;
pub const DVI_SYMBOLS_PER_WORD: usize = 2;
pub const WORDS_PER_LANE: usize = FRAME_WIDTH / DVI_SYMBOLS_PER_WORD;
pub const N_TMDS_LANES: usize = 3;
pub const WORDS_PER_SCANLINE: usize = WORDS_PER_LANE * N_TMDS_LANES;
pub const DVI_BIT_CLOCK_KHZ: u32 = 270_000;
pub const DVI_CLOCK_TOLERANCE_KHZ: u32 = 1;
pub const DVI_N_TMDS_BUFFERS: usize = 3;

// Font ROM layout: text set first, graphics set 1 KiB later.
pub const FONT_ROM_SIZE: usize = 0x800;
pub const FONT_GRAPHICS_OFFSET: usize = 0x400;

// Menu window.
pub const MENU_COLUMNS: usize = 40;
pub const MENU_ROWS: usize = 25;
