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

    core::keyboard::hid.rs

    USB HID usage IDs, modifier bits and LED bits for boot protocol keyboards.

*/

pub const HID_KEY_NONE: u8 = 0x00;
pub const HID_KEY_A: u8 = 0x04;
pub const HID_KEY_Z: u8 = 0x1D;
pub const HID_KEY_1: u8 = 0x1E;
pub const HID_KEY_2: u8 = 0x1F;
pub const HID_KEY_3: u8 = 0x20;
pub const HID_KEY_4: u8 = 0x21;
pub const HID_KEY_5: u8 = 0x22;
pub const HID_KEY_6: u8 = 0x23;
pub const HID_KEY_7: u8 = 0x24;
pub const HID_KEY_8: u8 = 0x25;
pub const HID_KEY_9: u8 = 0x26;
pub const HID_KEY_0: u8 = 0x27;
pub const HID_KEY_ENTER: u8 = 0x28;
pub const HID_KEY_ESCAPE: u8 = 0x29;
pub const HID_KEY_BACKSPACE: u8 = 0x2A;
pub const HID_KEY_TAB: u8 = 0x2B;
pub const HID_KEY_SPACE: u8 = 0x2C;
pub const HID_KEY_MINUS: u8 = 0x2D;
pub const HID_KEY_EQUAL: u8 = 0x2E;
pub const HID_KEY_BRACKET_LEFT: u8 = 0x2F;
pub const HID_KEY_BRACKET_RIGHT: u8 = 0x30;
pub const HID_KEY_BACKSLASH: u8 = 0x31;
pub const HID_KEY_SEMICOLON: u8 = 0x33;
pub const HID_KEY_APOSTROPHE: u8 = 0x34;
pub const HID_KEY_GRAVE: u8 = 0x35;
pub const HID_KEY_COMMA: u8 = 0x36;
pub const HID_KEY_PERIOD: u8 = 0x37;
pub const HID_KEY_SLASH: u8 = 0x38;
pub const HID_KEY_CAPS_LOCK: u8 = 0x39;
pub const HID_KEY_SCROLL_LOCK: u8 = 0x47;
pub const HID_KEY_HOME: u8 = 0x4A;
pub const HID_KEY_PAGE_UP: u8 = 0x4B;
pub const HID_KEY_DELETE: u8 = 0x4C;
pub const HID_KEY_END: u8 = 0x4D;
pub const HID_KEY_PAGE_DOWN: u8 = 0x4E;
pub const HID_KEY_ARROW_RIGHT: u8 = 0x4F;
pub const HID_KEY_ARROW_LEFT: u8 = 0x50;
pub const HID_KEY_ARROW_DOWN: u8 = 0x51;
pub const HID_KEY_ARROW_UP: u8 = 0x52;
pub const HID_KEY_NUM_LOCK: u8 = 0x53;
/// The eight modifier keys follow in modifier bit order.
pub const HID_KEY_CONTROL_LEFT: u8 = 0xE0;

pub const KEYBOARD_MODIFIER_LEFTCTRL: u8 = 1 << 0;
pub const KEYBOARD_MODIFIER_LEFTSHIFT: u8 = 1 << 1;
pub const KEYBOARD_MODIFIER_LEFTALT: u8 = 1 << 2;
pub const KEYBOARD_MODIFIER_LEFTGUI: u8 = 1 << 3;
pub const KEYBOARD_MODIFIER_RIGHTCTRL: u8 = 1 << 4;
pub const KEYBOARD_MODIFIER_RIGHTSHIFT: u8 = 1 << 5;
pub const KEYBOARD_MODIFIER_RIGHTALT: u8 = 1 << 6;
pub const KEYBOARD_MODIFIER_RIGHTGUI: u8 = 1 << 7;

pub const KEYBOARD_MODIFIER_SHIFT: u8 = KEYBOARD_MODIFIER_LEFTSHIFT | KEYBOARD_MODIFIER_RIGHTSHIFT;

pub const MODIFIER_NAMES: [&str; 8] = [
    "CONTROL_LEFT",
    "SHIFT_LEFT",
    "ALT_LEFT",
    "GUI_LEFT",
    "CONTROL_RIGHT",
    "SHIFT_RIGHT",
    "ALT_RIGHT",
    "GUI_RIGHT",
];

pub const KEYBOARD_LED_NUMLOCK: u8 = 1 << 0;
pub const KEYBOARD_LED_CAPSLOCK: u8 = 1 << 1;
pub const KEYBOARD_LED_SCROLLLOCK: u8 = 1 << 2;

#[inline]
pub fn is_lock_key(keycode: u8) -> bool {
    matches!(keycode, HID_KEY_CAPS_LOCK | HID_KEY_NUM_LOCK | HID_KEY_SCROLL_LOCK)
}
