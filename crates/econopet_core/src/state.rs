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

    core::state.rs

    Process-wide firmware state: the PET model read from the DIP switches,
    display configuration, terminal routing and the USB keymaps.

    State that the scanline renderer on the second core reads lives in
    `SharedVideo`, which holds only atomics. The renderer tolerates torn
    reads; a frame drawn from half-updated registers is corrected on the
    next frame.

*/

use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
};

use modular_bitfield::{bitfield, prelude::*};
use strum_macros::{Display, EnumIter};

use crate::hw::{CRTC_REG_COUNT, KEY_COL_COUNT, VIDEO_CHAR_BUFFER_BYTE_SIZE, VIDEO_COLOR_OFFSET};

// CRTC (6545) register indices.
pub const CRTC_R0_H_TOTAL: usize = 0;
pub const CRTC_R1_H_DISPLAYED: usize = 1;
pub const CRTC_R2_H_SYNC_POS: usize = 2;
pub const CRTC_R3_SYNC_WIDTH: usize = 3;
pub const CRTC_R4_V_TOTAL: usize = 4;
pub const CRTC_R5_V_ADJUST: usize = 5;
pub const CRTC_R6_V_DISPLAYED: usize = 6;
pub const CRTC_R7_V_SYNC_POS: usize = 7;
pub const CRTC_R8_MODE_CONTROL: usize = 8;
pub const CRTC_R9_MAX_SCAN_LINE: usize = 9;
pub const CRTC_R10_CURSOR_START_LINE: usize = 10;
pub const CRTC_R11_CURSOR_END_LINE: usize = 11;
pub const CRTC_R12_START_ADDR_HI: usize = 12;
pub const CRTC_R13_START_ADDR_LO: usize = 13;

/// Register values a 40 column CRTC PET programs at power on.
pub const CRTC_DEFAULT_REGISTERS: [u8; CRTC_REG_COUNT] = [
    0x31, // R0  horizontal total - 1
    0x28, // R1  40 displayed columns
    0x29, // R2  hsync position
    0x0F, // R3  sync widths
    0x28, // R4  vertical total - 1
    0x05, // R5  vertical adjust
    0x19, // R6  25 displayed rows
    0x21, // R7  vsync position
    0x00, // R8  mode control
    0x07, // R9  scanlines per row - 1
    0x00, // R10 cursor start
    0x00, // R11 cursor end
    0x10, // R12 start address high (ma[12] = 1: normal video)
    0x00, // R13 start address low
];

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum PetKeyboardModel {
    Graphics = 0,
    Business = 1,
}

impl PetKeyboardModel {
    pub fn other(self) -> Self {
        match self {
            PetKeyboardModel::Graphics => PetKeyboardModel::Business,
            PetKeyboardModel::Business => PetKeyboardModel::Graphics,
        }
    }
}

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum PetVideoType {
    /// Non-CRTC, 9" 15 kHz display.
    Fixed = 0,
    /// CRTC, 12" 20 kHz display.
    Crtc = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayColumns {
    Forty,
    Eighty,
}

impl DisplayColumns {
    pub fn count(self) -> u32 {
        match self {
            DisplayColumns::Forty => 40,
            DisplayColumns::Eighty => 80,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            40 => Some(DisplayColumns::Forty),
            80 => Some(DisplayColumns::Eighty),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoSource {
    /// DVI shows what the 6502 writes to $8000.
    Pet,
    /// DVI shows the firmware's own buffer.
    Firmware,
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum TermMode {
    Cli,
    Log,
    Video,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TermInputDest {
    Ignore,
    ToPet,
    ToFirmware,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum UsbKeymapKind {
    Symbolic = 0,
    Positional = 1,
}

impl FromStr for UsbKeymapKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "symbolic" | "sym" => Ok(UsbKeymapKind::Symbolic),
            "positional" | "pos" => Ok(UsbKeymapKind::Positional),
            _ => Err("Bad value for UsbKeymapKind".to_string()),
        }
    }
}

/// Maps one USB HID code to a PET matrix position.
#[bitfield]
#[derive(Copy, Clone)]
pub struct UsbKeymapEntry {
    /// 0-7; 0xF marks an unmapped key.
    pub row: B4,
    pub col: B4,
    #[skip]
    reserved: B6,
    /// Release shift while this key is down.
    pub unshift: bool,
    /// Hold shift while this key is down.
    pub shift: bool,
}

impl UsbKeymapEntry {
    pub fn mapped(row: u8, col: u8) -> Self {
        UsbKeymapEntry::new().with_row(row).with_col(col)
    }

    /// The entry names a real matrix position. Keymap files can carry
    /// columns past the end of the matrix; those keys are dropped.
    pub fn is_mapped(&self) -> bool {
        if self.row() > 7 {
            return false;
        }
        if self.col() as usize >= KEY_COL_COUNT {
            log::debug!("keymap: column {} out of range, key ignored", self.col());
            return false;
        }
        true
    }
}

impl fmt::Debug for UsbKeymapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbKeymapEntry")
            .field("row", &self.row())
            .field("col", &self.col())
            .field("unshift", &self.unshift())
            .field("shift", &self.shift())
            .finish()
    }
}

pub const USB_KEYMAP_ENTRIES: usize = 512;
pub const USB_KEYMAP_ENTRY_SIZE: usize = 2;
/// Size of the keymap image: [model][kind][entry].
pub const USB_KEYMAP_IMAGE_SIZE: usize = 2 * 2 * USB_KEYMAP_ENTRIES * USB_KEYMAP_ENTRY_SIZE;

/// Both keymap kinds for both keyboard models, stored as the raw on-disk image.
pub struct UsbKeymaps {
    image: Box<[u8]>,
}

impl UsbKeymaps {
    pub fn new() -> Self {
        // 0xFF decodes to row 0xF: every key starts unmapped.
        Self {
            image: vec![0xFF; USB_KEYMAP_IMAGE_SIZE].into_boxed_slice(),
        }
    }

    fn offset(model: PetKeyboardModel, kind: UsbKeymapKind, index: usize) -> usize {
        (((model as usize * 2) + kind as usize) * USB_KEYMAP_ENTRIES + index) * USB_KEYMAP_ENTRY_SIZE
    }

    pub fn entry(&self, model: PetKeyboardModel, kind: UsbKeymapKind, index: usize) -> UsbKeymapEntry {
        let o = Self::offset(model, kind, index & (USB_KEYMAP_ENTRIES - 1));
        UsbKeymapEntry::from_bytes([self.image[o], self.image[o + 1]])
    }

    pub fn set_entry(&mut self, model: PetKeyboardModel, kind: UsbKeymapKind, index: usize, entry: UsbKeymapEntry) {
        let o = Self::offset(model, kind, index & (USB_KEYMAP_ENTRIES - 1));
        self.image[o..o + 2].copy_from_slice(&entry.into_bytes());
    }

    /// Copy part of a keymap image in at `offset`. Bytes past the end of the
    /// image are ignored.
    pub fn write_image(&mut self, offset: usize, data: &[u8]) {
        if offset >= self.image.len() {
            return;
        }
        let n = data.len().min(self.image.len() - offset);
        self.image[offset..offset + n].copy_from_slice(&data[..n]);
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

impl Default for UsbKeymaps {
    fn default() -> Self {
        Self::new()
    }
}

/// Video state read by the scanline renderer.
pub struct SharedVideo {
    chars:    Box<[AtomicU8]>,
    crtc:     [AtomicU8; CRTC_REG_COUNT],
    graphics: AtomicBool,
    columns_80: AtomicBool,
}

impl SharedVideo {
    pub fn new() -> Self {
        Self {
            chars: (0..VIDEO_CHAR_BUFFER_BYTE_SIZE).map(|_| AtomicU8::new(0)).collect(),
            crtc: CRTC_DEFAULT_REGISTERS.map(AtomicU8::new),
            graphics: AtomicBool::new(false),
            columns_80: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    #[inline]
    pub fn char_at(&self, index: usize) -> u8 {
        self.chars[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn color_at(&self, index: usize) -> u8 {
        self.chars[VIDEO_COLOR_OFFSET + (index & (VIDEO_COLOR_OFFSET - 1))].load(Ordering::Relaxed)
    }

    pub fn load(&self, offset: usize, dst: &mut [u8]) {
        for (i, b) in dst.iter_mut().enumerate() {
            *b = self.chars[offset + i].load(Ordering::Relaxed);
        }
    }

    pub fn store(&self, offset: usize, src: &[u8]) {
        for (i, b) in src.iter().enumerate() {
            self.chars[offset + i].store(*b, Ordering::Relaxed);
        }
    }

    pub fn fill(&self, offset: usize, len: usize, byte: u8) {
        for cell in &self.chars[offset..offset + len] {
            cell.store(byte, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.chars.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn crtc_registers(&self) -> [u8; CRTC_REG_COUNT] {
        let mut regs = [0u8; CRTC_REG_COUNT];
        for (dst, src) in regs.iter_mut().zip(self.crtc.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
        regs
    }

    pub fn set_crtc_registers(&self, regs: &[u8; CRTC_REG_COUNT]) {
        for (dst, src) in self.crtc.iter().zip(regs.iter()) {
            dst.store(*src, Ordering::Relaxed);
        }
    }

    pub fn graphics(&self) -> bool {
        self.graphics.load(Ordering::Relaxed)
    }

    pub fn set_graphics(&self, graphics: bool) {
        self.graphics.store(graphics, Ordering::Relaxed);
    }

    pub fn columns_80(&self) -> bool {
        self.columns_80.load(Ordering::Relaxed)
    }

    pub fn set_columns_80(&self, columns_80: bool) {
        self.columns_80.store(columns_80, Ordering::Relaxed);
    }
}

impl Default for SharedVideo {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SystemState {
    pub keymaps: UsbKeymaps,

    pub pet_keyboard_model: PetKeyboardModel,
    pub pet_video_type: PetVideoType,
    pet_display_columns: DisplayColumns,
    video_ram_mask: u8,
    video_ram_bytes: usize,

    pub video_source: VideoSource,
    pub term_mode: TermMode,
    pub term_input_dest: TermInputDest,

    pub video: Arc<SharedVideo>,
}

impl SystemState {
    pub fn new() -> Self {
        Self {
            keymaps: UsbKeymaps::new(),
            pet_keyboard_model: PetKeyboardModel::Graphics,
            pet_video_type: PetVideoType::Crtc,
            pet_display_columns: DisplayColumns::Forty,
            video_ram_mask: 0,
            video_ram_bytes: 1024,
            video_source: VideoSource::Firmware,
            term_mode: TermMode::Cli,
            term_input_dest: TermInputDest::ToFirmware,
            video: Arc::new(SharedVideo::new()),
        }
    }

    pub fn display_columns(&self) -> DisplayColumns {
        self.pet_display_columns
    }

    pub fn set_display_columns(&mut self, columns: DisplayColumns) {
        self.pet_display_columns = columns;
        self.video.set_columns_80(columns == DisplayColumns::Eighty);
    }

    pub fn video_ram_mask(&self) -> u8 {
        self.video_ram_mask
    }

    /// Number of bytes of PET video RAM mirrored by the display task.
    pub fn video_ram_bytes(&self) -> usize {
        self.video_ram_bytes
    }

    /// Set the video RAM mask, keeping the derived byte count in step.
    ///  0 = 1 KB at $8000 (40 column)
    ///  1 = 2 KB at $8000 (80 column)
    ///  2 = 1 KB at $8000 + 1 KB color at $8800
    ///  3 = 4 KB at $8000 (80 column color)
    pub fn set_video_ram_mask(&mut self, mask: u8) {
        assert!(mask <= 3, "video RAM mask out of range: {}", mask);
        self.video_ram_mask = mask;
        self.video_ram_bytes = (mask as usize + 1) * 1024;
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}
