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

    common::keys.rs

    Logical keycodes delivered to firmware UI code.

    Values 0-127 are ASCII. Navigation keys decoded from terminal escape
    sequences occupy 1000-1007 and the menu button 1100-1101.

*/

use strum_macros::{Display, EnumIter};

pub type KeyCode = u16;

pub const KEY_CTRL_C: KeyCode = 0x03;
pub const KEY_BACKSPACE: KeyCode = 0x08;
pub const KEY_TAB: KeyCode = 0x09;
pub const KEY_LF: KeyCode = 0x0A;
pub const KEY_CR: KeyCode = 0x0D;
pub const KEY_ESC: KeyCode = 0x1B;
pub const KEY_DEL: KeyCode = 0x7F;

pub const KEY_UP: KeyCode = 1000;
pub const KEY_DOWN: KeyCode = 1001;
pub const KEY_RIGHT: KeyCode = 1002;
pub const KEY_LEFT: KeyCode = 1003;
pub const KEY_HOME: KeyCode = 1004;
pub const KEY_END: KeyCode = 1005;
pub const KEY_PGUP: KeyCode = 1006;
pub const KEY_PGDN: KeyCode = 1007;

pub const KEY_BTN_SHORT: KeyCode = 1100;
pub const KEY_BTN_LONG: KeyCode = 1101;

/// Navigation keys with an extended keycode.
#[derive(Copy, Clone, Debug, Display, EnumIter, Eq, PartialEq)]
pub enum NavKey {
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    PageUp,
    PageDown,
}

impl NavKey {
    pub fn keycode(&self) -> KeyCode {
        match self {
            NavKey::Up => KEY_UP,
            NavKey::Down => KEY_DOWN,
            NavKey::Right => KEY_RIGHT,
            NavKey::Left => KEY_LEFT,
            NavKey::Home => KEY_HOME,
            NavKey::End => KEY_END,
            NavKey::PageUp => KEY_PGUP,
            NavKey::PageDown => KEY_PGDN,
        }
    }

    pub fn from_keycode(key: KeyCode) -> Option<NavKey> {
        match key {
            KEY_UP => Some(NavKey::Up),
            KEY_DOWN => Some(NavKey::Down),
            KEY_RIGHT => Some(NavKey::Right),
            KEY_LEFT => Some(NavKey::Left),
            KEY_HOME => Some(NavKey::Home),
            KEY_END => Some(NavKey::End),
            KEY_PGUP => Some(NavKey::PageUp),
            KEY_PGDN => Some(NavKey::PageDown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn navkey_codes_are_contiguous() {
        for (i, key) in NavKey::iter().enumerate() {
            assert_eq!(key.keycode(), KEY_UP + i as KeyCode);
            assert_eq!(NavKey::from_keycode(key.keycode()), Some(key));
        }
        assert_eq!(NavKey::from_keycode(b'A' as KeyCode), None);
    }
}
