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

    common::char_encoding.rs

    Conversion tables between ASCII, PET video ROM offsets and VT-100
    terminal strings. The tables assume the lower-case character set.

*/

/// Maps ASCII (0x00-0x7F) to the PET video ROM offset used to display it.
pub const ASCII_TO_VROM: [u8; 128] = {
    let mut table = [0u8; 128];
    let mut ch: usize = 0;
    while ch < 128 {
        let c = ch as u8;
        table[ch] = match c {
            b'@' => 0x00,
            b'a'..=b'z' => c - b'a' + 0x01,
            b'A'..=b'Z' => c - b'A' + 0x41,
            b'['..=b'^' => c - 0x40,
            b'_' => 0x64,
            b'`' => 0x27,
            b'{' => 0x6B,
            b'|' => 0x5B,
            b'}' => 0x73,
            b'~' => 0x71,
            _ => c,
        };
        ch += 1;
    }
    table
};

const LD_HLINE: &str = "\x1b(0q\x1b(B";
const LD_VLINE: &str = "\x1b(0x\x1b(B";
const LD_TOP_LEFT: &str = "\x1b(0l\x1b(B";
const LD_TOP_RIGHT: &str = "\x1b(0k\x1b(B";
const LD_BOTTOM_LEFT: &str = "\x1b(0m\x1b(B";
const LD_BOTTOM_RIGHT: &str = "\x1b(0j\x1b(B";
const LD_TEE_RIGHT: &str = "\x1b(0t\x1b(B";
const LD_TEE_LEFT: &str = "\x1b(0u\x1b(B";
const LD_TEE_UP: &str = "\x1b(0v\x1b(B";
const LD_TEE_DOWN: &str = "\x1b(0w\x1b(B";
const LD_CROSS: &str = "\x1b(0n\x1b(B";

/// Maps PET video ROM offsets (0x00-0x7F) to the closest VT-100 equivalent.
/// Box drawing glyphs use the DEC special graphics set.
#[rustfmt::skip]
pub static VROM_TO_TERM: [&str; 128] = [
    // 0x00
    "@", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o",
    // 0x10
    "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "[", "\\", "]", "^", "<",
    // 0x20
    " ", "!", "\"", "#", "$", "%", "&", "'", "(", ")", "*", "+", ",", "-", ".", "/",
    // 0x30
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", ":", ";", "<", "=", ">", "?",
    // 0x40
    LD_HLINE, "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O",
    // 0x50
    "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", LD_CROSS, "_", LD_VLINE, "_", "_",
    // 0x60
    "_", "_", "_", "_", "_", "_", "_", "_", "_", "_", "_", LD_TEE_RIGHT, "_", LD_BOTTOM_LEFT, LD_TOP_RIGHT, "_",
    // 0x70
    LD_TOP_LEFT, LD_TEE_UP, LD_TEE_DOWN, LD_TEE_LEFT, "_", "_", "_", "_", "_", "_", "_", "_", "_", LD_BOTTOM_RIGHT, "_", "_",
];

/// Convert an ASCII character to a PET video ROM offset. Bytes outside 7-bit
/// ASCII map to 0.
#[inline]
pub fn ascii_to_vrom(ascii: u8) -> u8 {
    if ascii < 128 {
        ASCII_TO_VROM[ascii as usize]
    }
    else {
        0
    }
}

/// Convert a PET video ROM offset to a terminal string. Bit 7 (reverse video)
/// is ignored.
#[inline]
pub fn vrom_to_term(vrom: u8) -> &'static str {
    VROM_TO_TERM[(vrom & 0x7F) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_to_vrom_maps_printable() {
        for i in 0..10u8 {
            assert_eq!(ascii_to_vrom(b'0' + i), 0x30 + i);
        }
        for i in 0..26u8 {
            assert_eq!(ascii_to_vrom(b'a' + i), 0x01 + i);
            assert_eq!(ascii_to_vrom(b'A' + i), 0x41 + i);
        }
        for c in 0x20..=0x2Fu8 {
            assert_eq!(ascii_to_vrom(c), c);
        }
        for c in 0x3A..=0x3Fu8 {
            assert_eq!(ascii_to_vrom(c), c);
        }
        for c in b'['..=b'^' {
            assert_eq!(ascii_to_vrom(c), c - 0x40);
        }
    }

    #[test]
    fn ascii_to_vrom_substitutions() {
        assert_eq!(ascii_to_vrom(b'@'), 0x00);
        assert_eq!(ascii_to_vrom(b'_'), 0x64);
        assert_eq!(ascii_to_vrom(b'`'), 0x27);
        assert_eq!(ascii_to_vrom(b'{'), 0x6B);
        assert_eq!(ascii_to_vrom(b'|'), 0x5B);
        assert_eq!(ascii_to_vrom(b'}'), 0x73);
        assert_eq!(ascii_to_vrom(b'~'), 0x71);
        assert_eq!(ascii_to_vrom(128), 0x00);
        assert_eq!(ascii_to_vrom(255), 0x00);
    }

    #[test]
    fn vrom_to_term_is_never_empty() {
        for i in 0..128u8 {
            assert!(!vrom_to_term(i).is_empty(), "empty entry for ${:02X}", i);
        }
    }

    #[test]
    fn vrom_to_term_ignores_reverse_bit() {
        assert_eq!(vrom_to_term(0x20), vrom_to_term(0xA0));
        assert_eq!(vrom_to_term(0x41), vrom_to_term(0xC1));
        assert_eq!(vrom_to_term(0x01), vrom_to_term(0x81));
    }

    #[test]
    fn vrom_to_term_line_drawing() {
        for vrom in [0x40u8, 0x5D, 0x70, 0x6E, 0x6D, 0x7D] {
            let s = vrom_to_term(vrom);
            assert!(s.contains("\x1b(0"));
            assert!(s.ends_with("\x1b(B"));
        }
    }

    #[test]
    fn ascii_roundtrip_through_terminal() {
        let mut expected = String::from(" ");
        expected.extend('0'..='9');
        expected.extend('A'..='Z');
        expected.extend('a'..='z');

        for ch in expected.chars() {
            assert_eq!(vrom_to_term(ascii_to_vrom(ch as u8)), ch.to_string());
        }
    }
}
