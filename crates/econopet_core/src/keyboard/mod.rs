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

    core::keyboard::mod.rs

    USB keyboard to PET keyboard matrix translation.

    HID reports are diffed into key events, translated through the active
    keymap and queued. Dispatch then applies the queued events to the USB
    side matrix, which sync_state() pushes to the PLD every main loop pass.

*/

pub mod hid;
pub mod keyscan;
pub mod keystate;
pub mod usb;

pub use keyscan::{KeyScanner, PetKeyEvent, KEY_EVENT_NONE};
pub use keystate::KeyStateVector;
pub use usb::{KeyEvent, KeyboardHandler, UsbKeyboard, KEY_EVENT_QUEUE_CAPACITY, MAX_KEYBOARDS};

/// Receives synthesized key presses as if they came from a USB keyboard.
pub trait HidEventSink {
    fn key_down(&mut self, keycode: u8, modifiers: u8);
    fn key_up(&mut self, keycode: u8, modifiers: u8);
}
