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

    core::crtc.rs

    Display geometry derived from the 6545 CRTC register bank.

    Geometry is recomputed on every blank scanline, so any register pattern,
    including garbage at boot, must produce a geometry the renderer can
    draw without overrunning the scanline.

*/

use crate::{
    hw::CRTC_REG_COUNT,
    state::{DisplayColumns, CRTC_R12_START_ADDR_HI, CRTC_R13_START_ADDR_LO, CRTC_R1_H_DISPLAYED, CRTC_R6_V_DISPLAYED, CRTC_R9_MAX_SCAN_LINE},
};

// Bit 12 of the display start address selects normal (1) or inverted (0) video.
const START_ADDR_INVERT_BIT: u16 = 1 << 12;

/// Frame parameters the geometry is computed against.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameParams {
    pub frame_width: usize,
    pub frame_height: usize,
    pub font_width: usize,
    pub symbols_per_word: usize,
}

impl FrameParams {
    pub fn words_per_lane(&self) -> usize {
        self.frame_width / self.symbols_per_word
    }
}

impl Default for FrameParams {
    fn default() -> Self {
        use crate::hw::{DVI_SYMBOLS_PER_WORD, FONT_WIDTH, FRAME_HEIGHT, FRAME_WIDTH};
        Self {
            frame_width: FRAME_WIDTH,
            frame_height: FRAME_HEIGHT,
            font_width: FONT_WIDTH,
            symbols_per_word: DVI_SYMBOLS_PER_WORD,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DisplayGeometry {
    pub chars_per_row: usize,
    pub rows: usize,
    pub scanlines_per_row: usize,
    /// Offset of the first displayed character within video RAM.
    pub vram_start: usize,
    pub vram_mask: usize,
    /// XORed into every glyph byte: 0x00 normal, 0xFF inverted.
    pub invert_mask: u8,
    pub visible_scanlines: usize,
    pub top_margin: usize,
    /// 40 column mode draws each glyph pixel twice.
    pub double_width: bool,
    pub left_margin_words: usize,
    pub content_words: usize,
    pub right_margin_words: usize,
}

impl DisplayGeometry {
    pub fn calculate(crtc: &[u8; CRTC_REG_COUNT], columns: DisplayColumns, frame: &FrameParams) -> DisplayGeometry {
        let words_per_lane = frame.words_per_lane();
        let max_cells = frame.frame_width / 16;

        let mut h_displayed = (crtc[CRTC_R1_H_DISPLAYED] as usize).min(max_cells);
        let v_displayed = (crtc[CRTC_R6_V_DISPLAYED] & 0x7F) as usize;

        let mut lines_per_row = (crtc[CRTC_R9_MAX_SCAN_LINE] & 0x1F) as usize + 1;
        if v_displayed > 0 {
            lines_per_row = lines_per_row.min(frame.frame_height / v_displayed);
        }

        let start = (((crtc[CRTC_R12_START_ADDR_HI] & 0x3F) as u16) << 8) | crtc[CRTC_R13_START_ADDR_LO] as u16;
        let invert_mask = if start & START_ADDR_INVERT_BIT != 0 { 0x00 } else { 0xFF };

        let visible_scanlines = v_displayed * lines_per_row;
        let top_margin = frame.frame_height.saturating_sub(visible_scanlines) / 2;

        let left_margin_words = (max_cells - h_displayed) * frame.font_width / frame.symbols_per_word;
        let content_words = h_displayed * frame.font_width * 2 / frame.symbols_per_word;
        let right_margin_words = words_per_lane - left_margin_words - content_words;

        let mut start = start as usize;
        let vram_mask;
        if columns == DisplayColumns::Eighty {
            h_displayed *= 2;
            start *= 2;
            vram_mask = 0x7FF;
        }
        else {
            vram_mask = 0x3FF;
        }

        DisplayGeometry {
            chars_per_row: h_displayed,
            rows: v_displayed,
            scanlines_per_row: lines_per_row,
            vram_start: start & vram_mask,
            vram_mask,
            invert_mask,
            visible_scanlines,
            top_margin,
            double_width: columns == DisplayColumns::Forty,
            left_margin_words,
            content_words,
            right_margin_words,
        }
    }
}
