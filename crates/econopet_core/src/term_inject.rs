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

    core::term_inject.rs

    Types characters from the serial terminal into the PET by synthesizing
    USB keyboard presses and releases.

*/

use arraydeque::{ArrayDeque, Saturating};
use thiserror::Error;

use econopet_common::keys::{KeyCode, KEY_UP};

use crate::keyboard::{hid::*, HidEventSink};

pub const INJECT_QUEUE_CAPACITY: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HidKey {
    pub keycode: u8,
    pub shifted: bool,
}

const fn key(keycode: u8, shifted: bool) -> HidKey {
    HidKey { keycode, shifted }
}

const NONE: HidKey = key(HID_KEY_NONE, false);

/// US layout: which key, and whether shift is needed, to type each ASCII code.
pub static ASCII_TO_HID: [HidKey; 128] = {
    let mut t = [NONE; 128];
    t[0x08] = key(HID_KEY_BACKSPACE, false);
    t[0x09] = key(HID_KEY_TAB, false);
    t[0x0A] = key(HID_KEY_ENTER, false);
    t[0x0D] = key(HID_KEY_ENTER, false);
    t[0x1B] = key(HID_KEY_ESCAPE, false);

    t[b' ' as usize] = key(HID_KEY_SPACE, false);
    t[b'!' as usize] = key(HID_KEY_1, true);
    t[b'"' as usize] = key(HID_KEY_APOSTROPHE, true);
    t[b'#' as usize] = key(HID_KEY_3, true);
    t[b'$' as usize] = key(HID_KEY_4, true);
    t[b'%' as usize] = key(HID_KEY_5, true);
    t[b'&' as usize] = key(HID_KEY_7, true);
    t[b'\'' as usize] = key(HID_KEY_APOSTROPHE, false);
    t[b'(' as usize] = key(HID_KEY_9, true);
    t[b')' as usize] = key(HID_KEY_0, true);
    t[b'*' as usize] = key(HID_KEY_8, true);
    t[b'+' as usize] = key(HID_KEY_EQUAL, true);
    t[b',' as usize] = key(HID_KEY_COMMA, false);
    t[b'-' as usize] = key(HID_KEY_MINUS, false);
    t[b'.' as usize] = key(HID_KEY_PERIOD, false);
    t[b'/' as usize] = key(HID_KEY_SLASH, false);

    t[b'0' as usize] = key(HID_KEY_0, false);
    let mut d = 1;
    while d <= 9 {
        t[b'0' as usize + d] = key(HID_KEY_1 + d as u8 - 1, false);
        d += 1;
    }

    t[b':' as usize] = key(HID_KEY_SEMICOLON, true);
    t[b';' as usize] = key(HID_KEY_SEMICOLON, false);
    t[b'<' as usize] = key(HID_KEY_COMMA, true);
    t[b'=' as usize] = key(HID_KEY_EQUAL, false);
    t[b'>' as usize] = key(HID_KEY_PERIOD, true);
    t[b'?' as usize] = key(HID_KEY_SLASH, true);
    t[b'@' as usize] = key(HID_KEY_2, true);

    let mut c = 0;
    while c < 26 {
        t[b'A' as usize + c] = key(HID_KEY_A + c as u8, true);
        t[b'a' as usize + c] = key(HID_KEY_A + c as u8, false);
        c += 1;
    }

    t[b'[' as usize] = key(HID_KEY_BRACKET_LEFT, false);
    t[b'\\' as usize] = key(HID_KEY_BACKSLASH, false);
    t[b']' as usize] = key(HID_KEY_BRACKET_RIGHT, false);
    t[b'^' as usize] = key(HID_KEY_6, true);
    t[b'_' as usize] = key(HID_KEY_MINUS, true);
    t[b'`' as usize] = key(HID_KEY_GRAVE, false);
    t[b'{' as usize] = key(HID_KEY_BRACKET_LEFT, true);
    t[b'|' as usize] = key(HID_KEY_BACKSLASH, true);
    t[b'}' as usize] = key(HID_KEY_BRACKET_RIGHT, true);
    t[b'~' as usize] = key(HID_KEY_GRAVE, true);
    t[0x7F] = key(HID_KEY_DELETE, false);
    t
};

/// Navigation keys, indexed from `KEY_UP`.
pub static EXTENDED_TO_HID: [HidKey; 8] = [
    key(HID_KEY_ARROW_UP, false),
    key(HID_KEY_ARROW_DOWN, false),
    key(HID_KEY_ARROW_RIGHT, false),
    key(HID_KEY_ARROW_LEFT, false),
    key(HID_KEY_HOME, false),
    key(HID_KEY_END, false),
    key(HID_KEY_PAGE_UP, false),
    key(HID_KEY_PAGE_DOWN, false),
];

#[derive(Debug, Error, PartialEq)]
pub enum InjectError {
    #[error("injection queue full")]
    QueueFull,
    #[error("no key for keycode {0}")]
    Unmapped(KeyCode),
}

pub fn translate(ch: KeyCode) -> Option<HidKey> {
    let mapping = if ch < 128 {
        ASCII_TO_HID[ch as usize]
    }
    else if (KEY_UP..KEY_UP + EXTENDED_TO_HID.len() as KeyCode).contains(&ch) {
        EXTENDED_TO_HID[(ch - KEY_UP) as usize]
    }
    else {
        return None;
    };
    (mapping.keycode != HID_KEY_NONE).then_some(mapping)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum InjectState {
    Idle,
    KeyDown,
    KeyUp,
}

pub struct TermInject {
    queue: ArrayDeque<HidKey, INJECT_QUEUE_CAPACITY, Saturating>,
    state: InjectState,
    keycode: u8,
    modifiers: u8,
}

impl Default for TermInject {
    fn default() -> Self {
        Self::new()
    }
}

impl TermInject {
    pub fn new() -> Self {
        Self {
            queue: ArrayDeque::new(),
            state: InjectState::Idle,
            keycode: 0,
            modifiers: 0,
        }
    }

    /// Queue a character for typing.
    pub fn inject_char(&mut self, ch: KeyCode) -> Result<(), InjectError> {
        if self.queue.is_full() {
            return Err(InjectError::QueueFull);
        }
        let Some(mapping) = translate(ch)
        else {
            log::debug!("term_inject: no mapping for keycode {}", ch);
            return Err(InjectError::Unmapped(ch));
        };
        self.queue.push_back(mapping).map_err(|_| InjectError::QueueFull)
    }

    pub fn is_idle(&self) -> bool {
        self.state == InjectState::Idle && self.queue.is_empty()
    }

    /// Advance one step. A character takes three steps: press, hold for one
    /// pass, release.
    pub fn task(&mut self, sink: &mut dyn HidEventSink) {
        match self.state {
            InjectState::Idle => {
                let Some(entry) = self.queue.pop_front()
                else {
                    return;
                };
                self.keycode = entry.keycode;
                self.modifiers = if entry.shifted { KEYBOARD_MODIFIER_LEFTSHIFT } else { 0 };
                sink.key_down(self.keycode, self.modifiers);
                log::debug!(
                    "term_inject: enqueue key down HID=0x{:02x} (shift={})",
                    self.keycode,
                    entry.shifted
                );
                self.state = InjectState::KeyDown;
            }
            InjectState::KeyDown => {
                self.state = InjectState::KeyUp;
            }
            InjectState::KeyUp => {
                sink.key_up(self.keycode, self.modifiers);
                log::debug!("term_inject: enqueue key up");
                self.state = InjectState::Idle;
            }
        }
    }
}
