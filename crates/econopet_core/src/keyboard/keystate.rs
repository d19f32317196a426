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

    core::keyboard::keystate.rs

    Remembers, per HID keycode, whether the key is down and whether shift
    was held when it went down.

*/

/// Key is down.
pub const KEYSTATE_PRESSED: u8 = 1 << 0;
/// Key went down with shift held.
pub const KEYSTATE_SHIFTED: u8 = 1 << 1;

const FLAG_BITS: u32 = 2;
const FLAG_MASK: u32 = (1 << FLAG_BITS) - 1;
const KEYS_PER_WORD: usize = 32 / FLAG_BITS as usize;

/// Two bits for each of the 256 keycodes, packed into 16 words.
#[derive(Clone, Default)]
pub struct KeyStateVector {
    words: [u32; 256 / KEYS_PER_WORD],
}

impl KeyStateVector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn location(keycode: u8) -> (usize, u32) {
        let keycode = keycode as usize;
        (keycode / KEYS_PER_WORD, (keycode % KEYS_PER_WORD) as u32 * FLAG_BITS)
    }

    pub fn set(&mut self, keycode: u8, flags: u8) {
        let (word, shift) = Self::location(keycode);
        self.words[word] &= !(FLAG_MASK << shift);
        self.words[word] |= (flags as u32 & FLAG_MASK) << shift;
    }

    /// Return the flags for `keycode` and clear them.
    pub fn reset(&mut self, keycode: u8) -> u8 {
        let (word, shift) = Self::location(keycode);
        let flags = (self.words[word] >> shift) & FLAG_MASK;
        self.words[word] &= !(FLAG_MASK << shift);
        flags as u8
    }

    pub fn get(&self, keycode: u8) -> u8 {
        let (word, shift) = Self::location(keycode);
        ((self.words[word] >> shift) & FLAG_MASK) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_reset_roundtrips_every_keycode() {
        let mut ks = KeyStateVector::new();
        for flags in 0..4u8 {
            for k in 0..=255u8 {
                ks.set(k, flags);
                assert_eq!(ks.reset(k), flags);
                assert_eq!(ks.reset(k), 0);
            }
        }
    }

    #[test]
    fn neighbours_are_untouched() {
        let mut ks = KeyStateVector::new();
        ks.set(0x10, KEYSTATE_PRESSED | KEYSTATE_SHIFTED);
        ks.set(0x0F, KEYSTATE_PRESSED);
        ks.set(0x11, KEYSTATE_SHIFTED);

        assert_eq!(ks.reset(0x10), KEYSTATE_PRESSED | KEYSTATE_SHIFTED);
        assert_eq!(ks.get(0x0F), KEYSTATE_PRESSED);
        assert_eq!(ks.get(0x11), KEYSTATE_SHIFTED);
    }
}
