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

    core::video::tmds.rs

    TMDS symbol tables and the per-lane glyph encoders.

    Each color lane carries 2 bits per pixel. A pixel's 2-bit level is one of
    four DC-balanced byte values, chosen so that any even/odd pair of levels
    returns the encoder's running disparity to zero. This lets every table
    entry be encoded once, independent of its position on the scanline.

*/

use crate::hw::{FONT_HEIGHT, FONT_WIDTH, N_TMDS_LANES};

const INVERSION_MASK: u32 = 0x2FF;

/// Control period symbols, indexed by the (C1, C0) pair.
pub const TMDS_CTRL_SYMBOLS: [u32; 4] = [0b1101010100, 0b0010101011, 0b0101010100, 0b1010101011];

pub const LEVELS_EVEN: [u32; 4] = [0x05, 0x50, 0xAF, 0xFA];
pub const LEVELS_ODD: [u32; 4] = [0x04, 0x51, 0xAE, 0xFB];

/// The 16-color palette, one RRRGGGBB byte per color.
pub const DEFAULT_PALETTE: [u8; 16] = [
    0x00, // 0: black
    0x49, // 1: medium gray
    0x01, // 2: blue
    0x03, // 3: light blue
    0x10, // 4: green
    0x1C, // 5: light green
    0x0D, // 6: dark cyan
    0x1F, // 7: light cyan
    0x40, // 8: red
    0xE0, // 9: light red
    0x81, // 10: dark magenta
    0xE3, // 11: magenta
    0x6C, // 12: dark yellow
    0xDC, // 13: yellow
    0xB6, // 14: light gray
    0xFF, // 15: white
];

const fn byte_imbalance(x: u32) -> i32 {
    2 * x.count_ones() as i32 - 8
}

/// Encode one 8-bit value with the DVI 1.0 TMDS algorithm (figure 3-5).
/// Returns the 10-bit symbol and the updated running disparity.
pub const fn encode_symbol(imbalance: i32, d: u32) -> (u32, i32) {
    let ones = d.count_ones();
    let mut q_m = d & 1;
    let mut i = 0;
    if ones > 4 || (ones == 4 && d & 1 == 0) {
        while i < 7 {
            q_m |= (!((q_m >> i) ^ (d >> (i + 1))) & 1) << (i + 1);
            i += 1;
        }
    }
    else {
        while i < 7 {
            q_m |= (((q_m >> i) ^ (d >> (i + 1))) & 1) << (i + 1);
            i += 1;
        }
        q_m |= 0x100;
    }

    let balance = byte_imbalance(q_m & 0xFF);
    if imbalance == 0 || balance == 0 {
        if q_m & 0x100 != 0 {
            (q_m, imbalance + balance)
        }
        else {
            (q_m ^ INVERSION_MASK, imbalance - balance)
        }
    }
    else if (imbalance > 0) == (balance > 0) {
        (q_m ^ INVERSION_MASK, imbalance + ((q_m & 0x100) >> 7) as i32 - balance)
    }
    else {
        (q_m, imbalance + balance - ((!q_m & 0x100) >> 7) as i32)
    }
}

/// Symbol pairs for every (background, foreground, 4-pixel run). Entry
/// `((bg << 2 | fg) * 16 + run) * 2` holds pixels 0-1, the next word pixels
/// 2-3. Bit 3 of the run is the leftmost pixel.
pub const TMDS_TABLE: [u32; 512] = {
    let mut table = [0u32; 512];
    let mut imbalance = 0;
    let mut index = 0;
    let mut bg = 0;
    while bg < 4 {
        let mut fg = 0;
        while fg < 4 {
            let mut run = 0;
            while run < 16 {
                let mut sym = [0u32; 4];
                let mut x = 0;
                while x < 4 {
                    let level = if run & (8 >> x) != 0 { fg } else { bg };
                    let value = if x & 1 != 0 { LEVELS_ODD[level] } else { LEVELS_EVEN[level] };
                    let (s, next) = encode_symbol(imbalance, value);
                    sym[x] = s;
                    imbalance = next;
                    x += 1;
                }
                table[index] = (sym[1] << 10) | sym[0];
                table[index + 1] = (sym[3] << 10) | sym[2];
                index += 2;
                run += 1;
            }
            fg += 1;
        }
        bg += 1;
    }
    table
};

/// Per color byte and lane, the 4-bit `(bg << 2) | fg` index into `TMDS_TABLE`.
/// Lanes are ordered blue, green, red.
#[derive(Clone)]
pub struct PaletteTable {
    entries: Box<[u8]>,
}

impl PaletteTable {
    pub fn new(fg_palette: &[u8; 16], bg_palette: &[u8; 16]) -> Self {
        let mut entries = vec![0u8; 256 * N_TMDS_LANES];
        for bg in 0..16 {
            for fg in 0..16 {
                let color = (bg << 4) | fg;
                let [bg_b, bg_g, bg_r] = Self::components(bg_palette[bg]);
                let [fg_b, fg_g, fg_r] = Self::components(fg_palette[fg]);
                entries[color * 3] = (bg_b << 2) | fg_b;
                entries[color * 3 + 1] = (bg_g << 2) | fg_g;
                entries[color * 3 + 2] = (bg_r << 2) | fg_r;
            }
        }
        Self {
            entries: entries.into_boxed_slice(),
        }
    }

    /// Reduce an RRRGGGBB color to 2-bit blue, green and red intensities.
    fn components(rgb: u8) -> [u8; 3] {
        [rgb & 0x03, (rgb >> 3) & 0x03, (rgb >> 6) & 0x03]
    }

    #[inline]
    pub fn entry(&self, color: u8, lane: usize) -> usize {
        self.entries[color as usize * N_TMDS_LANES + lane] as usize
    }
}

impl Default for PaletteTable {
    fn default() -> Self {
        PaletteTable::new(&DEFAULT_PALETTE, &DEFAULT_PALETTE)
    }
}

/// Pixels for one glyph scanline. Bit 7 of the character reverses the cell;
/// scanlines past the font height are blank.
#[inline]
pub fn glyph_bits(font: &[u8], ch: u8, scanline: usize, invert: u8) -> u8 {
    let mut bits = if scanline < FONT_HEIGHT {
        font.get((ch & 0x7F) as usize * FONT_HEIGHT + scanline).copied().unwrap_or(0)
    }
    else {
        0
    };
    if ch & 0x80 != 0 {
        bits ^= 0xFF;
    }
    bits ^ invert
}

/// Double every pixel of an 8-pixel run.
#[inline]
pub fn stretch_x(x: u8) -> u16 {
    let mut x = x as u16;
    x = (x | (x << 4)) & 0x0F0F;
    x = (x | (x << 2)) & 0x3333;
    x = (x | (x << 1)) & 0x5555;
    x | (x << 1)
}

#[inline]
fn emit_nibble(out: &mut [u32], lut: usize, nibble: u8) {
    let i = ((lut << 4) | nibble as usize) * 2;
    out[0] = TMDS_TABLE[i];
    out[1] = TMDS_TABLE[i + 1];
}

/// Encode one lane of 8-pixel glyph cells. Writes 4 words per character.
#[allow(clippy::too_many_arguments)]
pub fn encode_font_8px_lane(
    chars: &[u8],
    colors: &[u8],
    out: &mut [u32],
    font: &[u8],
    scanline: usize,
    lane: usize,
    invert: u8,
    palette: &PaletteTable,
) {
    const WORDS: usize = FONT_WIDTH / 2;
    for (i, (ch, color)) in chars.iter().zip(colors).enumerate() {
        let bits = glyph_bits(font, *ch, scanline, invert);
        let lut = palette.entry(*color, lane);
        let cell = &mut out[i * WORDS..(i + 1) * WORDS];
        emit_nibble(&mut cell[0..2], lut, bits >> 4);
        emit_nibble(&mut cell[2..4], lut, bits & 0x0F);
    }
}

/// Encode one lane of glyph cells stretched to 16 pixels. Writes 8 words per
/// character.
#[allow(clippy::too_many_arguments)]
pub fn encode_font_16px_lane(
    chars: &[u8],
    colors: &[u8],
    out: &mut [u32],
    font: &[u8],
    scanline: usize,
    lane: usize,
    invert: u8,
    palette: &PaletteTable,
) {
    const WORDS: usize = FONT_WIDTH;
    for (i, (ch, color)) in chars.iter().zip(colors).enumerate() {
        let bits = stretch_x(glyph_bits(font, *ch, scanline, invert));
        let lut = palette.entry(*color, lane);
        let cell = &mut out[i * WORDS..(i + 1) * WORDS];
        emit_nibble(&mut cell[0..2], lut, (bits >> 12) as u8);
        emit_nibble(&mut cell[2..4], lut, ((bits >> 8) & 0x0F) as u8);
        emit_nibble(&mut cell[4..6], lut, ((bits >> 4) & 0x0F) as u8);
        emit_nibble(&mut cell[6..8], lut, (bits & 0x0F) as u8);
    }
}
