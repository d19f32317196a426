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

    core::input.rs

    Input routing. Once per main loop pass the router drains the UART,
    steps terminal injection and the USB keyboard, synchronises with the
    PLD and samples the menu button.

*/

use arraydeque::{ArrayDeque, Saturating};

use econopet_common::keys::{
    KeyCode,
    KEY_BTN_LONG,
    KEY_BTN_SHORT,
    KEY_CTRL_C,
    KEY_DOWN,
    KEY_END,
    KEY_ESC,
    KEY_HOME,
    KEY_LEFT,
    KEY_PGDN,
    KEY_PGUP,
    KEY_RIGHT,
    KEY_UP,
};

use crate::{
    error::{FirmwareError, FwResult},
    hal::{ButtonPin, Clock, Uart, UsbHost},
    keyboard::{UsbKeyboard, MAX_KEYBOARDS},
    link::Link,
    registers::sync_state,
    state::{SystemState, TermInputDest, TermMode},
    term_inject::TermInject,
};

pub const INPUT_QUEUE_CAPACITY: usize = 16;

pub const ESCAPE_SEQUENCE_TIMEOUT_US: u64 = 10_000;
const ESCAPE_POLL_US: u64 = 100;
const ESCAPE_BUFFER_LEN: usize = 10;

/// CSI sequences, after the leading `ESC [`.
const ESCAPE_SEQUENCES: [(&[u8], KeyCode); 8] = [
    (b"A", KEY_UP),
    (b"B", KEY_DOWN),
    (b"C", KEY_RIGHT),
    (b"D", KEY_LEFT),
    (b"F", KEY_END),
    (b"H", KEY_HOME),
    (b"5~", KEY_PGUP),
    (b"6~", KEY_PGDN),
];

pub const BUTTON_DEBOUNCE_US: u64 = 50_000;
pub const BUTTON_LONG_PRESS_US: u64 = 500_000;

fn is_sequence_terminator(ch: u8) -> bool {
    (64..=126).contains(&ch) || ch <= 31
}

fn wait_byte(uart: &mut dyn Uart, clock: &dyn Clock, timeout_us: u64) -> Option<u8> {
    let start = clock.now_us();
    loop {
        if let Some(byte) = uart.read_byte() {
            return Some(byte);
        }
        if clock.now_us() - start > timeout_us {
            return None;
        }
        clock.sleep_us(ESCAPE_POLL_US);
    }
}

fn parse_csi(uart: &mut dyn Uart, clock: &dyn Clock) -> Option<KeyCode> {
    let mut buf = [0u8; ESCAPE_BUFFER_LEN];
    let mut len = 0;
    loop {
        let ch = wait_byte(uart, clock, ESCAPE_SEQUENCE_TIMEOUT_US)?;
        buf[len] = ch;
        len += 1;
        if len == ESCAPE_BUFFER_LEN || is_sequence_terminator(ch) {
            break;
        }
    }

    ESCAPE_SEQUENCES
        .iter()
        .find(|(seq, _)| *seq == &buf[..len])
        .map(|(_, key)| *key)
}

/// Read one logical key from the UART, decoding VT100 cursor sequences. A
/// lone ESC is returned as itself once no follow-up arrives in time.
pub fn uart_getch(uart: &mut dyn Uart, clock: &dyn Clock) -> Option<KeyCode> {
    let ch = uart.read_byte()?;
    if ch as KeyCode != KEY_ESC {
        return Some(ch as KeyCode);
    }

    let Some(next) = wait_byte(uart, clock, ESCAPE_SEQUENCE_TIMEOUT_US)
    else {
        return Some(KEY_ESC);
    };
    if next != b'[' {
        return Some(next as KeyCode);
    }
    parse_csi(uart, clock)
}

/// Debounces the menu button and classifies presses as short or long.
///
/// At power on the button reads as pressed while the debounce capacitor
/// charges, so the state starts pressed and already handled.
pub struct ButtonDebouncer {
    last_change_us: u64,
    raw: bool,
    debounced: bool,
    pressed: bool,
    handled: bool,
    press_start_us: u64,
}

impl Default for ButtonDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonDebouncer {
    pub fn new() -> Self {
        Self {
            last_change_us: 0,
            raw: true,
            debounced: true,
            pressed: true,
            handled: true,
            press_start_us: 0,
        }
    }

    fn debounce(&mut self, raw: bool, now_us: u64) -> bool {
        if raw != self.raw {
            self.raw = raw;
            self.last_change_us = now_us;
            return self.debounced;
        }
        if now_us - self.last_change_us < BUTTON_DEBOUNCE_US {
            return self.debounced;
        }
        self.debounced = raw;
        self.debounced
    }

    /// Feed one raw sample. Returns `KEY_BTN_LONG` while held past the long
    /// press threshold, or `KEY_BTN_SHORT` on an earlier release.
    pub fn action(&mut self, raw: bool, now_us: u64) -> Option<KeyCode> {
        let was_pressed = self.pressed;
        self.pressed = self.debounce(raw, now_us);

        if !self.pressed {
            if was_pressed && !self.handled {
                log::debug!("MENU button: short press");
                self.handled = true;
                return Some(KEY_BTN_SHORT);
            }
        }
        else if !was_pressed {
            self.press_start_us = now_us;
            self.handled = false;
        }
        else if !self.handled && now_us - self.press_start_us > BUTTON_LONG_PRESS_US {
            log::debug!("MENU button: long press");
            self.handled = true;
            return Some(KEY_BTN_LONG);
        }
        None
    }
}

/// What the CLI side of the firmware does with terminal input.
pub trait TerminalHandler {
    fn cli_char(&mut self, ch: KeyCode, uart: &mut dyn Uart, state: &mut SystemState);
    fn exit_remote(&mut self, uart: &mut dyn Uart, state: &mut SystemState);
}

/// The peripherals the router polls.
pub struct InputIo<'a> {
    pub uart:   &'a mut dyn Uart,
    pub clock:  &'a dyn Clock,
    pub usb:    &'a mut dyn UsbHost,
    pub button: &'a mut dyn ButtonPin,
    pub link:   &'a mut Link,
}

pub struct InputRouter {
    queue: ArrayDeque<KeyCode, INPUT_QUEUE_CAPACITY, Saturating>,
    button: ButtonDebouncer,
    inject: TermInject,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InputRouter {
    pub fn new() -> Self {
        Self {
            queue: ArrayDeque::new(),
            button: ButtonDebouncer::new(),
            inject: TermInject::new(),
        }
    }

    /// Queue a key for the firmware UI. Dropped when the queue is full.
    pub fn enqueue_key(&mut self, key: KeyCode) {
        if self.queue.push_back(key).is_err() {
            log::debug!("input queue full, dropped key {}", key);
        }
    }

    pub fn inject(&mut self) -> &mut TermInject {
        &mut self.inject
    }

    pub fn task(
        &mut self,
        io: &mut InputIo<'_>,
        state: &mut SystemState,
        keyboard: &mut UsbKeyboard,
        term: &mut dyn TerminalHandler,
    ) -> FwResult<()> {
        if state.term_input_dest != TermInputDest::Ignore {
            while let Some(ch) = uart_getch(io.uart, io.clock) {
                match state.term_input_dest {
                    TermInputDest::ToPet => {
                        if ch == KEY_CTRL_C {
                            term.exit_remote(io.uart, state);
                        }
                        else if let Err(e) = self.inject.inject_char(ch) {
                            log::debug!("term_inject: {}", e);
                        }
                    }
                    TermInputDest::ToFirmware => {
                        if state.term_mode == TermMode::Cli {
                            term.cli_char(ch, io.uart, state);
                        }
                        else {
                            self.enqueue_key(ch);
                        }
                    }
                    TermInputDest::Ignore => {}
                }
            }
        }

        let model = state.pet_keyboard_model;
        {
            let mut handler = keyboard.handler(&state.keymaps, model);
            self.inject.task(&mut handler);
            io.usb.task(&mut handler);
        }
        if keyboard.take_overflow() {
            return Err(FirmwareError::TooManyKeyboards(MAX_KEYBOARDS));
        }
        keyboard.dispatch(&state.keymaps, model);
        if let Some(leds) = keyboard.take_led_update(model) {
            for (dev_addr, instance) in keyboard.attached() {
                io.usb.set_leds(dev_addr, instance, leds);
            }
        }

        let (usb_matrix, pet_matrix) = keyboard.matrices_mut();
        sync_state(io.link, state, usb_matrix, pet_matrix)?;

        let pressed = io.button.is_pressed();
        if let Some(action) = self.button.action(pressed, io.clock.now_us()) {
            self.enqueue_key(action);
        }
        Ok(())
    }

    /// Next key for the firmware UI: keyboard matrices first, then the queue.
    pub fn getch(&mut self, keyboard: &mut UsbKeyboard, state: &SystemState) -> Option<KeyCode> {
        keyboard
            .getch(state.pet_keyboard_model)
            .or_else(|| self.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hal::{BufferedUart, KeyboardReport, ManualClock, ScriptedButton, ScriptedUsbHost},
        hal::fake::UsbHostEvent,
        keyboard::hid::{HID_KEY_A, HID_KEY_CONTROL_LEFT, KEYBOARD_LED_NUMLOCK, KEYBOARD_LED_SCROLLLOCK},
        link::SimTarget,
        state::{PetKeyboardModel, UsbKeymapEntry, UsbKeymapKind},
    };

    #[test]
    fn escape_sequences_decode() {
        let clock = ManualClock::new(0);
        let mut uart = BufferedUart::with_input(b"\x1b[A\x1b[5~\x1b[6~\x1b[H");
        assert_eq!(uart_getch(&mut uart, &clock), Some(KEY_UP));
        assert_eq!(uart_getch(&mut uart, &clock), Some(KEY_PGUP));
        assert_eq!(uart_getch(&mut uart, &clock), Some(KEY_PGDN));
        assert_eq!(uart_getch(&mut uart, &clock), Some(KEY_HOME));
        assert_eq!(uart_getch(&mut uart, &clock), None);
    }

    #[test]
    fn lone_escape_times_out() {
        let clock = ManualClock::new(0);
        let mut uart = BufferedUart::with_input(b"\x1b");
        assert_eq!(uart_getch(&mut uart, &clock), Some(KEY_ESC));
        assert!(clock.now_us() > ESCAPE_SEQUENCE_TIMEOUT_US);
    }

    #[test]
    fn unknown_and_non_csi_sequences() {
        let clock = ManualClock::new(0);
        let mut uart = BufferedUart::with_input(b"\x1b[2J\x1bOx");
        assert_eq!(uart_getch(&mut uart, &clock), None);
        // ESC followed by anything but '[' yields the second byte.
        assert_eq!(uart_getch(&mut uart, &clock), Some(b'O' as KeyCode));
        assert_eq!(uart_getch(&mut uart, &clock), Some(b'x' as KeyCode));
    }

    #[test]
    fn truncated_csi_is_dropped() {
        let clock = ManualClock::new(0);
        let mut uart = BufferedUart::with_input(b"\x1b[5");
        assert_eq!(uart_getch(&mut uart, &clock), None);
    }

    fn feed(button: &mut ButtonDebouncer, samples: &[(u64, bool)]) -> Vec<KeyCode> {
        samples
            .iter()
            .filter_map(|(ms, raw)| button.action(*raw, ms * 1_000))
            .collect()
    }

    #[test]
    fn power_on_press_is_not_reported() {
        let mut button = ButtonDebouncer::new();
        assert!(feed(&mut button, &[(0, false), (10, false), (60, false), (100, false)]).is_empty());
    }

    #[test]
    fn short_press_reports_on_release() {
        let mut button = ButtonDebouncer::new();
        let samples = [
            (0, false),
            (60, false),
            (100, true),
            (160, true),
            (300, false),
            (320, false),
            (360, false),
            (400, false),
        ];
        assert_eq!(feed(&mut button, &samples), vec![KEY_BTN_SHORT]);
    }

    #[test]
    fn bounces_shorter_than_debounce_are_ignored() {
        let mut button = ButtonDebouncer::new();
        let samples = [(0, false), (60, false), (100, true), (110, false), (120, true), (130, false), (200, false)];
        assert!(feed(&mut button, &samples).is_empty());
    }

    #[test]
    fn long_press_reports_while_held() {
        let mut button = ButtonDebouncer::new();
        let samples = [
            (0, false),
            (60, false),
            (100, true),
            (160, true),
            (600, true),
            (661, true),
            (700, true),
            (800, false),
            (900, false),
        ];
        assert_eq!(feed(&mut button, &samples), vec![KEY_BTN_LONG]);
    }

    #[derive(Default)]
    struct RecordingTerm {
        cli: Vec<KeyCode>,
        exits: usize,
    }

    impl TerminalHandler for RecordingTerm {
        fn cli_char(&mut self, ch: KeyCode, _uart: &mut dyn Uart, _state: &mut SystemState) {
            self.cli.push(ch);
        }
        fn exit_remote(&mut self, _uart: &mut dyn Uart, state: &mut SystemState) {
            self.exits += 1;
            state.term_input_dest = TermInputDest::ToFirmware;
        }
    }

    struct Rig {
        sim: SimTarget,
        link: Link,
        uart: BufferedUart,
        clock: ManualClock,
        usb: ScriptedUsbHost,
        button: ScriptedButton,
        state: SystemState,
        keyboard: UsbKeyboard,
        router: InputRouter,
        term: RecordingTerm,
    }

    impl Rig {
        fn new() -> Self {
            let sim = SimTarget::new();
            let mut state = SystemState::new();
            state.pet_keyboard_model = PetKeyboardModel::Graphics;
            state.keymaps.set_entry(
                PetKeyboardModel::Graphics,
                UsbKeymapKind::Symbolic,
                HID_KEY_A as usize,
                UsbKeymapEntry::mapped(3, 0),
            );
            state.keymaps.set_entry(
                PetKeyboardModel::Graphics,
                UsbKeymapKind::Symbolic,
                HID_KEY_A as usize | 0x100,
                UsbKeymapEntry::mapped(3, 0),
            );
            state.keymaps.set_entry(
                PetKeyboardModel::Graphics,
                UsbKeymapKind::Symbolic,
                HID_KEY_CONTROL_LEFT as usize + 1,
                UsbKeymapEntry::mapped(0, 8),
            );
            Self {
                link: Link::new(Box::new(sim.clone())),
                sim,
                uart: BufferedUart::new(),
                clock: ManualClock::new(0),
                usb: ScriptedUsbHost::new(),
                button: ScriptedButton::new(&[false]),
                state,
                keyboard: UsbKeyboard::new(),
                router: InputRouter::new(),
                term: RecordingTerm::default(),
            }
        }

        fn step(&mut self) -> FwResult<()> {
            let mut io = InputIo {
                uart: &mut self.uart,
                clock: &self.clock,
                usb: &mut self.usb,
                button: &mut self.button,
                link: &mut self.link,
            };
            self.router
                .task(&mut io, &mut self.state, &mut self.keyboard, &mut self.term)
        }
    }

    #[test]
    fn cli_mode_routes_uart_to_cli() {
        let mut rig = Rig::new();
        rig.state.term_mode = TermMode::Cli;
        rig.state.term_input_dest = TermInputDest::ToFirmware;
        rig.uart.push_input(b"hi\r");
        rig.step().unwrap();
        assert_eq!(rig.term.cli, vec![b'h' as KeyCode, b'i' as KeyCode, b'\r' as KeyCode]);
        assert_eq!(rig.router.getch(&mut rig.keyboard, &rig.state), None);
    }

    #[test]
    fn menu_mode_queues_uart_keys() {
        let mut rig = Rig::new();
        rig.state.term_mode = TermMode::Video;
        rig.state.term_input_dest = TermInputDest::ToFirmware;
        rig.uart.push_input(b"\x1b[Bx");
        rig.step().unwrap();
        assert_eq!(rig.router.getch(&mut rig.keyboard, &rig.state), Some(KEY_DOWN));
        assert_eq!(rig.router.getch(&mut rig.keyboard, &rig.state), Some(b'x' as KeyCode));
        assert!(rig.term.cli.is_empty());
    }

    #[test]
    fn ignore_leaves_uart_unread() {
        let mut rig = Rig::new();
        rig.state.term_input_dest = TermInputDest::Ignore;
        rig.uart.push_input(b"abc");
        rig.step().unwrap();
        assert_eq!(rig.uart.read_byte(), Some(b'a'));
    }

    #[test]
    fn remote_mode_types_into_pet_matrix() {
        let mut rig = Rig::new();
        rig.state.term_mode = TermMode::Video;
        rig.state.term_input_dest = TermInputDest::ToPet;
        rig.uart.push_input(b"A");

        // Press: the key and shift reach the PLD on the same pass.
        rig.step().unwrap();
        let matrix = rig.sim.usb_matrix();
        assert_eq!(matrix[0] & (1 << 3), 0);
        assert_eq!(matrix[8] & 1, 0);

        rig.step().unwrap();
        rig.step().unwrap();
        let matrix = rig.sim.usb_matrix();
        assert_eq!(matrix[0], 0xFF);
        // Shift is released with the next key event.
        assert_eq!(matrix[8] & 1, 0);
    }

    #[test]
    fn ctrl_c_exits_remote_mode() {
        let mut rig = Rig::new();
        rig.state.term_mode = TermMode::Video;
        rig.state.term_input_dest = TermInputDest::ToPet;
        rig.uart.push_input(&[0x03, b'q']);
        rig.step().unwrap();
        assert_eq!(rig.term.exits, 1);
        // Bytes after the exit go to the firmware.
        assert_eq!(rig.router.getch(&mut rig.keyboard, &rig.state), Some(b'q' as KeyCode));
    }

    #[test]
    fn usb_keyboard_updates_sync_and_leds() {
        let mut rig = Rig::new();
        rig.usb.push(vec![
            UsbHostEvent::Mount(1, 0),
            UsbHostEvent::Report(1, 0, KeyboardReport::new(0, &[HID_KEY_A])),
        ]);
        rig.step().unwrap();
        assert_eq!(rig.usb.leds, vec![(1, 0, KEYBOARD_LED_NUMLOCK | KEYBOARD_LED_SCROLLLOCK)]);
        assert_eq!(rig.sim.usb_matrix()[0], !(1 << 3));
    }

    #[test]
    fn ninth_keyboard_is_fatal() {
        let mut rig = Rig::new();
        rig.usb.push((1..=9).map(|dev| UsbHostEvent::Mount(dev, 0)).collect());
        let err = rig.step().unwrap_err();
        assert!(matches!(err, FirmwareError::TooManyKeyboards(MAX_KEYBOARDS)));
        assert!(err.is_fatal());
    }

    #[test]
    fn physical_keys_reach_firmware() {
        let mut rig = Rig::new();
        // Graphics keyboard RETURN.
        rig.sim.set_physical_key(5, 6, true);
        rig.step().unwrap();
        assert_eq!(
            rig.router.getch(&mut rig.keyboard, &rig.state),
            Some(econopet_common::keys::KEY_CR)
        );
    }

    #[test]
    fn button_press_is_queued() {
        let mut rig = Rig::new();
        rig.button = ScriptedButton::new(&[false, false, true, true, false, false]);
        for _ in 0..6 {
            rig.step().unwrap();
            rig.clock.advance_ms(60);
        }
        assert_eq!(rig.router.getch(&mut rig.keyboard, &rig.state), Some(KEY_BTN_SHORT));
    }
}
