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

    core::keyboard::keyscan.rs

    Scans a PET keyboard matrix for changes, one key per call, and turns the
    handful of keys the firmware menus use into logical keycodes.

*/

use econopet_common::keys::{KeyCode, KEY_CR, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_UP};

use crate::{hw::KEY_COL_COUNT, state::PetKeyboardModel};

/// `pressed << 7 | row << 4 | col`.
pub type PetKeyEvent = u8;

/// Column 0xF does not exist, so this never collides with a real event.
pub const KEY_EVENT_NONE: PetKeyEvent = 0x7F;

pub fn key_event(pressed: bool, row: u8, col: u8) -> PetKeyEvent {
    assert!(row < 8);
    assert!((col as usize) < KEY_COL_COUNT);
    (if pressed { 0x80 } else { 0x00 }) | (row << 4) | col
}

#[inline]
pub fn key_event_row(event: PetKeyEvent) -> u8 {
    (event >> 4) & 0x07
}

#[inline]
pub fn key_event_col(event: PetKeyEvent) -> u8 {
    event & 0x0F
}

#[inline]
pub fn key_event_pressed(event: PetKeyEvent) -> bool {
    event & 0x80 != 0
}

/// Matrix positions of the keys used to drive the firmware UI.
struct UiKeys {
    down:   (u8, u8),
    right:  (u8, u8),
    ret:    (u8, u8),
    lshift: (u8, u8),
    rshift: (u8, u8),
}

const GRAPHICS_UI_KEYS: UiKeys = UiKeys {
    down:   (6, 1),
    right:  (7, 0),
    ret:    (5, 6),
    lshift: (0, 8),
    rshift: (5, 8),
};

const BUSINESS_UI_KEYS: UiKeys = UiKeys {
    down:   (4, 5),
    right:  (5, 0),
    ret:    (4, 3),
    lshift: (6, 6),
    rshift: (0, 6),
};

fn is_down(matrix: &[u8; KEY_COL_COUNT], (row, col): (u8, u8)) -> bool {
    matrix[col as usize] & (1 << row) == 0
}

pub struct KeyScanner {
    previous: [u8; KEY_COL_COUNT],
    row: u8,
    col: u8,
}

impl Default for KeyScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyScanner {
    pub fn new() -> Self {
        Self {
            previous: [0xFF; KEY_COL_COUNT],
            row: 0,
            col: 0,
        }
    }

    fn advance(&mut self) {
        self.row = (self.row + 1) % 8;
        if self.row == 0 {
            self.col = (self.col + 1) % KEY_COL_COUNT as u8;
        }
    }

    /// Return the first difference from the previously seen matrix, starting
    /// where the last scan stopped. Returns `KEY_EVENT_NONE` when nothing changed.
    pub fn next_key_event(&mut self, matrix: &[u8; KEY_COL_COUNT]) -> PetKeyEvent {
        let (start_row, start_col) = (self.row, self.col);
        let mut event = KEY_EVENT_NONE;

        loop {
            let c = self.col as usize;
            let mask = 1u8 << self.row;
            let now_down = matrix[c] & mask == 0;
            let was_down = self.previous[c] & mask == 0;

            if now_down && !was_down {
                event = key_event(true, self.row, self.col);
                self.previous[c] &= !mask;
            }
            else if !now_down && was_down {
                event = key_event(false, self.row, self.col);
                self.previous[c] |= mask;
            }

            self.advance();
            if event != KEY_EVENT_NONE || (self.row == start_row && self.col == start_col) {
                break;
            }
        }
        event
    }

    /// Translate the next key press into a logical keycode. Cursor keys honour
    /// either shift key; everything else is ignored.
    pub fn getch(&mut self, matrix: &[u8; KEY_COL_COUNT], model: PetKeyboardModel) -> Option<KeyCode> {
        let event = self.next_key_event(matrix);
        if event == KEY_EVENT_NONE || !key_event_pressed(event) {
            return None;
        }

        let keys = match model {
            PetKeyboardModel::Graphics => &GRAPHICS_UI_KEYS,
            PetKeyboardModel::Business => &BUSINESS_UI_KEYS,
        };
        let pos = (key_event_row(event), key_event_col(event));
        let shifted = is_down(matrix, keys.lshift) || is_down(matrix, keys.rshift);

        if pos == keys.down {
            Some(if shifted { KEY_UP } else { KEY_DOWN })
        }
        else if pos == keys.right {
            Some(if shifted { KEY_LEFT } else { KEY_RIGHT })
        }
        else if pos == keys.ret {
            Some(KEY_CR)
        }
        else {
            None
        }
    }
}
