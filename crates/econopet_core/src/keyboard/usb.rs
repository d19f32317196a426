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

    core::keyboard::usb.rs

    USB HID keyboard state: attached keyboards, the key event queue, lock
    keys and the USB side keyboard matrix.

*/

use arraydeque::{ArrayDeque, Saturating};

use econopet_common::keys::KeyCode;

use crate::{
    hal::{KeyboardReport, UsbHidHandler},
    hw::KEY_COL_COUNT,
    keyboard::{
        hid::*,
        keyscan::KeyScanner,
        keystate::{KeyStateVector, KEYSTATE_PRESSED, KEYSTATE_SHIFTED},
        HidEventSink,
    },
    state::{PetKeyboardModel, UsbKeymapEntry, UsbKeymapKind, UsbKeymaps},
};

pub const KEY_EVENT_QUEUE_CAPACITY: usize = 16;
pub const MAX_KEYBOARDS: usize = 8;

/// Keymap index offset of the shifted half.
const SHIFTED_KEYMAP_OFFSET: usize = 0x100;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KeyEvent {
    pub dev_addr:  u8,
    pub keycode:   u8,
    /// None for keys without a matrix position (unmapped lock keys).
    pub row:       Option<u8>,
    pub col:       u8,
    pub modifiers: u8,
    pub pressed:   bool,
}

#[derive(Copy, Clone, Debug, Default)]
struct KeyboardSlot {
    dev_addr: u8,
    instance: u8,
    attached: bool,
    prev_report: KeyboardReport,
}

pub struct UsbKeyboard {
    matrix: [u8; KEY_COL_COUNT],
    pet_matrix: [u8; KEY_COL_COUNT],
    events: ArrayDeque<KeyEvent, KEY_EVENT_QUEUE_CAPACITY, Saturating>,
    keystate: KeyStateVector,
    /// Keys whose release could not be queued, one bit per keycode.
    pending_release: [u32; 8],
    slots: [KeyboardSlot; MAX_KEYBOARDS],
    scanner: KeyScanner,

    active_modifiers: u8,
    caps_lock: bool,
    swap_model: bool,
    symbolic: bool,

    leds_dirty: bool,
    overflow: bool,
    dropped_events: u32,
}

impl Default for UsbKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbKeyboard {
    pub fn new() -> Self {
        Self {
            matrix: [0xFF; KEY_COL_COUNT],
            pet_matrix: [0xFF; KEY_COL_COUNT],
            events: ArrayDeque::new(),
            keystate: KeyStateVector::new(),
            pending_release: [0; 8],
            slots: [KeyboardSlot::default(); MAX_KEYBOARDS],
            scanner: KeyScanner::new(),
            active_modifiers: 0,
            caps_lock: false,
            swap_model: false,
            symbolic: true,
            leds_dirty: false,
            overflow: false,
            dropped_events: 0,
        }
    }

    /// Borrow the keyboard together with the keymaps it translates through.
    pub fn handler<'a>(&'a mut self, keymaps: &'a UsbKeymaps, pet_model: PetKeyboardModel) -> KeyboardHandler<'a> {
        KeyboardHandler {
            keyboard: self,
            keymaps,
            pet_model,
        }
    }

    /// The USB side matrix, active low, indexed by column.
    pub fn matrix(&self) -> &[u8; KEY_COL_COUNT] {
        &self.matrix
    }

    /// The matrix as last read back from the PLD.
    pub fn pet_matrix(&self) -> &[u8; KEY_COL_COUNT] {
        &self.pet_matrix
    }

    /// The USB matrix to push and the PET matrix to fill, for sync_state().
    pub fn matrices_mut(&mut self) -> (&[u8; KEY_COL_COUNT], &mut [u8; KEY_COL_COUNT]) {
        (&self.matrix, &mut self.pet_matrix)
    }

    pub fn any_usb_key_down(&self) -> bool {
        self.matrix.iter().any(|col| *col != 0xFF)
    }

    pub fn caps_lock(&self) -> bool {
        self.caps_lock
    }

    pub fn symbolic(&self) -> bool {
        self.symbolic
    }

    pub fn effective_model(&self, pet_model: PetKeyboardModel) -> PetKeyboardModel {
        if self.swap_model {
            pet_model.other()
        }
        else {
            pet_model
        }
    }

    pub fn keymap_kind(&self) -> UsbKeymapKind {
        if self.symbolic {
            UsbKeymapKind::Symbolic
        }
        else {
            UsbKeymapKind::Positional
        }
    }

    fn lookup(&self, keymaps: &UsbKeymaps, pet_model: PetKeyboardModel, index: usize) -> UsbKeymapEntry {
        keymaps.entry(self.effective_model(pet_model), self.keymap_kind(), index)
    }

    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_events(&self) -> u32 {
        self.dropped_events
    }

    fn enqueue(&mut self, event: KeyEvent) -> bool {
        if self.events.push_back(event).is_err() {
            self.dropped_events += 1;
            log::warn!("USB: key event queue full, dropped key {}", event.keycode);
            return false;
        }
        true
    }

    fn release_pending(&self, keycode: u8) -> bool {
        self.pending_release[keycode as usize / 32] & (1 << (keycode % 32)) != 0
    }

    fn set_release_pending(&mut self, keycode: u8, pending: bool) {
        let bit = 1u32 << (keycode % 32);
        if pending {
            self.pending_release[keycode as usize / 32] |= bit;
        }
        else {
            self.pending_release[keycode as usize / 32] &= !bit;
        }
    }

    /// Queue releases that were dropped while the queue was full.
    fn retry_releases(&mut self, keymaps: &UsbKeymaps, pet_model: PetKeyboardModel) {
        if self.pending_release.iter().all(|w| *w == 0) {
            return;
        }
        for keycode in 0..=255u8 {
            if self.release_pending(keycode) {
                self.enqueue_key_up(keymaps, pet_model, 0, keycode, self.active_modifiers);
                if self.release_pending(keycode) {
                    return;
                }
            }
        }
    }

    pub fn enqueue_key_down(
        &mut self,
        keymaps: &UsbKeymaps,
        pet_model: PetKeyboardModel,
        dev_addr: u8,
        keycode: u8,
        mut modifiers: u8,
    ) {
        if self.release_pending(keycode) {
            self.enqueue_key_up(keymaps, pet_model, dev_addr, keycode, modifiers);
            if self.release_pending(keycode) {
                self.dropped_events += 1;
                return;
            }
        }

        let shifted = modifiers & KEYBOARD_MODIFIER_SHIFT != 0;
        let index = keycode as usize | if shifted { SHIFTED_KEYMAP_OFFSET } else { 0 };
        let entry = self.lookup(keymaps, pet_model, index);

        let row = if entry.is_mapped() {
            if entry.shift() {
                modifiers |= KEYBOARD_MODIFIER_LEFTSHIFT;
            }
            if entry.unshift() {
                modifiers &= !KEYBOARD_MODIFIER_SHIFT;
            }
            Some(entry.row())
        }
        else if is_lock_key(keycode) {
            None
        }
        else {
            log::debug!("USB: Key down {}=(undefined)", keycode);
            return;
        };

        let queued = self.enqueue(KeyEvent {
            dev_addr,
            keycode,
            row,
            col: entry.col(),
            modifiers,
            pressed: true,
        });
        // A press that never reached the queue must not get a release.
        if queued {
            self.keystate
                .set(keycode, KEYSTATE_PRESSED | if shifted { KEYSTATE_SHIFTED } else { 0 });
        }
    }

    /// Queue a release using the shift state the key was pressed with. If the
    /// queue is full the key stays pressed and the release is retried.
    pub fn enqueue_key_up(
        &mut self,
        keymaps: &UsbKeymaps,
        pet_model: PetKeyboardModel,
        dev_addr: u8,
        keycode: u8,
        modifiers: u8,
    ) {
        let flags = self.keystate.get(keycode);
        if flags & KEYSTATE_PRESSED == 0 {
            log::debug!("USB: Key up {}=(not found)", keycode);
            return;
        }

        let index = keycode as usize
            | if flags & KEYSTATE_SHIFTED != 0 {
                SHIFTED_KEYMAP_OFFSET
            }
            else {
                0
            };
        let entry = self.lookup(keymaps, pet_model, index);

        let row = if entry.is_mapped() {
            Some(entry.row())
        }
        else if is_lock_key(keycode) {
            None
        }
        else {
            log::debug!("USB: Key up {}=(undefined)", keycode);
            self.keystate.reset(keycode);
            self.set_release_pending(keycode, false);
            return;
        };

        let queued = self.enqueue(KeyEvent {
            dev_addr,
            keycode,
            row,
            col: entry.col(),
            modifiers,
            pressed: false,
        });
        if queued {
            self.keystate.reset(keycode);
        }
        self.set_release_pending(keycode, !queued);
    }

    /// Diff a report against the previous one from the same keyboard.
    fn process_report(
        &mut self,
        keymaps: &UsbKeymaps,
        pet_model: PetKeyboardModel,
        slot: usize,
        report: &KeyboardReport,
    ) {
        self.retry_releases(keymaps, pet_model);

        let prev = self.slots[slot].prev_report;
        let dev_addr = self.slots[slot].dev_addr;
        let mut keys_changed = false;

        for keycode in prev.keycode {
            if keycode != HID_KEY_NONE && !report.keycode.contains(&keycode) {
                self.enqueue_key_up(keymaps, pet_model, dev_addr, keycode, report.modifier);
                keys_changed = true;
            }
        }
        for keycode in report.keycode {
            if keycode != HID_KEY_NONE && !prev.keycode.contains(&keycode) {
                self.enqueue_key_down(keymaps, pet_model, dev_addr, keycode, report.modifier);
                keys_changed = true;
            }
        }

        // A bare modifier change still has to reach the matrix.
        if !keys_changed && report.modifier != prev.modifier {
            self.enqueue(KeyEvent {
                dev_addr,
                keycode: HID_KEY_NONE,
                row: None,
                col: 0,
                modifiers: report.modifier,
                pressed: false,
            });
        }

        self.slots[slot].prev_report = *report;
    }

    fn find_slot(&self, dev_addr: u8, instance: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.attached && s.dev_addr == dev_addr && s.instance == instance)
    }

    pub fn mount(&mut self, dev_addr: u8, instance: u8) {
        match self.slots.iter().position(|s| !s.attached) {
            Some(slot) => {
                self.slots[slot] = KeyboardSlot {
                    dev_addr,
                    instance,
                    attached: true,
                    prev_report: KeyboardReport::default(),
                };
                log::info!("USB: keyboard attached (dev={}, instance={})", dev_addr, instance);
                self.leds_dirty = true;
            }
            None => {
                log::error!("USB: too many keyboards (dev={}, instance={})", dev_addr, instance);
                self.overflow = true;
            }
        }
    }

    /// Release whatever the keyboard was holding, then forget it.
    pub fn unmount(&mut self, keymaps: &UsbKeymaps, pet_model: PetKeyboardModel, dev_addr: u8, instance: u8) {
        if let Some(slot) = self.find_slot(dev_addr, instance) {
            self.process_report(keymaps, pet_model, slot, &KeyboardReport::default());
            self.slots[slot].attached = false;
            log::info!("USB: keyboard detached (dev={}, instance={})", dev_addr, instance);
        }
    }

    pub fn report(
        &mut self,
        keymaps: &UsbKeymaps,
        pet_model: PetKeyboardModel,
        dev_addr: u8,
        instance: u8,
        report: &KeyboardReport,
    ) {
        match self.find_slot(dev_addr, instance) {
            Some(slot) => self.process_report(keymaps, pet_model, slot, report),
            None => log::warn!("USB: report from unknown keyboard (dev={}, instance={})", dev_addr, instance),
        }
    }

    pub fn attached(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.slots.iter().filter(|s| s.attached).map(|s| (s.dev_addr, s.instance))
    }

    /// True once if a keyboard was refused because the roster was full.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflow)
    }

    pub fn led_report(&self, pet_model: PetKeyboardModel) -> u8 {
        let mut leds = 0;
        if self.caps_lock {
            leds |= KEYBOARD_LED_CAPSLOCK;
        }
        if self.effective_model(pet_model) == PetKeyboardModel::Graphics {
            leds |= KEYBOARD_LED_NUMLOCK;
        }
        if self.symbolic {
            leds |= KEYBOARD_LED_SCROLLLOCK;
        }
        leds
    }

    /// The LED report to send to every attached keyboard, if it changed.
    pub fn take_led_update(&mut self, pet_model: PetKeyboardModel) -> Option<u8> {
        if std::mem::take(&mut self.leds_dirty) {
            Some(self.led_report(pet_model))
        }
        else {
            None
        }
    }

    fn effective_modifiers(&self, event: &KeyEvent) -> u8 {
        let mut modifiers = event.modifiers;
        if self.caps_lock {
            modifiers |= KEYBOARD_MODIFIER_LEFTSHIFT;
        }
        modifiers
    }

    fn matrix_key_down(&mut self, keycode: u8, row: u8, col: u8) {
        let mask = 1u8 << row;
        let col_bits = &mut self.matrix[col as usize];
        if *col_bits & mask != 0 {
            *col_bits &= !mask;
            log::debug!("USB: Key down: {}=({},{})", keycode, row, col);
        }
    }

    fn matrix_key_up(&mut self, keycode: u8, row: u8, col: u8) {
        let mask = 1u8 << row;
        let col_bits = &mut self.matrix[col as usize];
        if *col_bits & mask == 0 {
            *col_bits |= mask;
            log::debug!("USB: Key up: {}=({},{})", keycode, row, col);
        }
    }

    fn modifier_key(&mut self, keymaps: &UsbKeymaps, pet_model: PetKeyboardModel, bit: u8, pressed: bool) {
        let keycode = HID_KEY_CONTROL_LEFT + bit;
        let entry = self.lookup(keymaps, pet_model, keycode as usize);
        if !entry.is_mapped() {
            return;
        }
        if pressed {
            self.matrix_key_down(keycode, entry.row(), entry.col());
        }
        else {
            self.matrix_key_up(keycode, entry.row(), entry.col());
        }
    }

    fn toggle_lock(&mut self, keycode: u8) {
        match keycode {
            HID_KEY_CAPS_LOCK => {
                self.caps_lock = !self.caps_lock;
                log::info!("USB: Shift lock {}", if self.caps_lock { "enabled" } else { "disabled" });
            }
            HID_KEY_NUM_LOCK => {
                self.swap_model = !self.swap_model;
                log::info!("USB: Keyboard model swap {}", if self.swap_model { "enabled" } else { "disabled" });
            }
            HID_KEY_SCROLL_LOCK => {
                self.symbolic = !self.symbolic;
                log::info!("USB: Using {} keymap", self.keymap_kind());
            }
            _ => return,
        }
        self.leds_dirty = true;
    }

    /// Apply queued events to the matrix. Modifier changes are applied first,
    /// then events are consumed for as long as they share those modifiers.
    pub fn dispatch(&mut self, keymaps: &UsbKeymaps, pet_model: PetKeyboardModel) {
        let Some(first) = self.events.front().copied()
        else {
            return;
        };

        let modifiers = self.effective_modifiers(&first);
        if modifiers != self.active_modifiers {
            let previous = self.active_modifiers;
            self.active_modifiers = modifiers;

            for bit in 0..8u8 {
                let mask = 1 << bit;
                if modifiers & mask != 0 && previous & mask == 0 {
                    log::debug!("USB: Modifier down: {}", MODIFIER_NAMES[bit as usize]);
                    self.modifier_key(keymaps, pet_model, bit, true);
                }
                else if modifiers & mask == 0 && previous & mask != 0 {
                    log::debug!("USB: Modifier up: {}", MODIFIER_NAMES[bit as usize]);
                    self.modifier_key(keymaps, pet_model, bit, false);
                }
            }
        }

        while let Some(event) = self.events.pop_front() {
            if is_lock_key(event.keycode) {
                if event.pressed {
                    self.toggle_lock(event.keycode);
                }
            }
            else if let Some(row) = event.row {
                if event.pressed {
                    self.matrix_key_down(event.keycode, row, event.col);
                }
                else {
                    self.matrix_key_up(event.keycode, row, event.col);
                }
            }

            match self.events.front() {
                Some(next) if self.effective_modifiers(next) == self.active_modifiers => {}
                _ => break,
            }
        }

        self.retry_releases(keymaps, pet_model);
    }

    /// A logical keycode for the firmware UI, from the USB matrix while any
    /// USB key is down, otherwise from the PLD's matrix.
    pub fn getch(&mut self, pet_model: PetKeyboardModel) -> Option<KeyCode> {
        if self.any_usb_key_down() {
            let model = self.effective_model(pet_model);
            self.scanner.getch(&self.matrix, model)
        }
        else {
            self.scanner.getch(&self.pet_matrix, pet_model)
        }
    }
}

/// A keyboard borrowed with its keymaps, handed to the USB host stack and
/// to terminal injection.
pub struct KeyboardHandler<'a> {
    keyboard:  &'a mut UsbKeyboard,
    keymaps:   &'a UsbKeymaps,
    pet_model: PetKeyboardModel,
}

impl UsbHidHandler for KeyboardHandler<'_> {
    fn on_mount(&mut self, dev_addr: u8, instance: u8) {
        self.keyboard.mount(dev_addr, instance);
    }

    fn on_unmount(&mut self, dev_addr: u8, instance: u8) {
        self.keyboard.unmount(self.keymaps, self.pet_model, dev_addr, instance);
    }

    fn on_report(&mut self, dev_addr: u8, instance: u8, report: &KeyboardReport) {
        self.keyboard
            .report(self.keymaps, self.pet_model, dev_addr, instance, report);
    }
}

impl HidEventSink for KeyboardHandler<'_> {
    fn key_down(&mut self, keycode: u8, modifiers: u8) {
        self.keyboard
            .enqueue_key_down(self.keymaps, self.pet_model, 0, keycode, modifiers);
    }

    fn key_up(&mut self, keycode: u8, modifiers: u8) {
        self.keyboard
            .enqueue_key_up(self.keymaps, self.pet_model, 0, keycode, modifiers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A_POS: (u8, u8) = (3, 0);
    const A_SHIFTED_POS: (u8, u8) = (4, 0);
    const LSHIFT_POS: (u8, u8) = (0, 8);
    const DIGIT2_POS: (u8, u8) = (1, 1);
    const GRAPHICS_ONLY_POS: (u8, u8) = (2, 2);

    fn keymaps() -> UsbKeymaps {
        let mut maps = UsbKeymaps::new();
        let g = PetKeyboardModel::Graphics;
        let sym = UsbKeymapKind::Symbolic;
        maps.set_entry(g, sym, HID_KEY_A as usize, UsbKeymapEntry::mapped(A_POS.0, A_POS.1));
        maps.set_entry(
            g,
            sym,
            HID_KEY_A as usize | SHIFTED_KEYMAP_OFFSET,
            UsbKeymapEntry::mapped(A_SHIFTED_POS.0, A_SHIFTED_POS.1),
        );
        let shift = HID_KEY_CONTROL_LEFT as usize + 1;
        maps.set_entry(g, sym, shift, UsbKeymapEntry::mapped(LSHIFT_POS.0, LSHIFT_POS.1));
        maps.set_entry(
            g,
            sym,
            HID_KEY_2 as usize | SHIFTED_KEYMAP_OFFSET,
            UsbKeymapEntry::mapped(DIGIT2_POS.0, DIGIT2_POS.1).with_unshift(true),
        );
        maps.set_entry(
            g,
            sym,
            HID_KEY_3 as usize,
            UsbKeymapEntry::mapped(DIGIT2_POS.0, DIGIT2_POS.1).with_shift(true),
        );
        maps.set_entry(
            g,
            sym,
            HID_KEY_B as usize,
            UsbKeymapEntry::mapped(GRAPHICS_ONLY_POS.0, GRAPHICS_ONLY_POS.1),
        );
        maps
    }

    const HID_KEY_B: u8 = HID_KEY_A + 1;
    const G: PetKeyboardModel = PetKeyboardModel::Graphics;

    fn is_down(kbd: &UsbKeyboard, (row, col): (u8, u8)) -> bool {
        kbd.matrix()[col as usize] & (1 << row) == 0
    }

    fn report(kbd: &mut UsbKeyboard, maps: &UsbKeymaps, modifier: u8, keys: &[u8]) {
        kbd.handler(maps, G).on_report(1, 0, &KeyboardReport::new(modifier, keys));
    }

    fn attached() -> (UsbKeyboard, UsbKeymaps) {
        let mut kbd = UsbKeyboard::new();
        let maps = keymaps();
        kbd.handler(&maps, G).on_mount(1, 0);
        (kbd, maps)
    }

    fn drain(kbd: &mut UsbKeyboard, maps: &UsbKeymaps) {
        while kbd.queued_events() > 0 {
            kbd.dispatch(maps, G);
        }
    }

    #[test]
    fn press_and_release_toggle_matrix_bit() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, 0, &[HID_KEY_A]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, A_POS));
        assert!(kbd.any_usb_key_down());

        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert!(!is_down(&kbd, A_POS));
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);
    }

    #[test]
    fn release_uses_shift_state_from_press() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, KEYBOARD_MODIFIER_LEFTSHIFT, &[HID_KEY_A]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, A_SHIFTED_POS));
        assert!(is_down(&kbd, LSHIFT_POS));

        // Shift comes up before the key.
        report(&mut kbd, &maps, 0, &[HID_KEY_A]);
        drain(&mut kbd, &maps);
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);

        assert!(!is_down(&kbd, A_SHIFTED_POS));
        assert!(!is_down(&kbd, A_POS));
        assert!(!is_down(&kbd, LSHIFT_POS));
    }

    #[test]
    fn modifiers_reach_matrix_before_key() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, KEYBOARD_MODIFIER_LEFTSHIFT, &[HID_KEY_A]);
        assert_eq!(kbd.queued_events(), 1);
        kbd.dispatch(&maps, G);
        assert!(is_down(&kbd, LSHIFT_POS));
        assert!(is_down(&kbd, A_SHIFTED_POS));
    }

    #[test]
    fn keymap_flags_force_shift_state() {
        let (mut kbd, maps) = attached();
        // '3' is mapped with an implied shift.
        report(&mut kbd, &maps, 0, &[HID_KEY_3]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, LSHIFT_POS));
        assert!(is_down(&kbd, DIGIT2_POS));
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);

        // Shifted '2' is mapped with an implied unshift.
        report(&mut kbd, &maps, KEYBOARD_MODIFIER_LEFTSHIFT, &[HID_KEY_2]);
        drain(&mut kbd, &maps);
        assert!(!is_down(&kbd, LSHIFT_POS));
        assert!(is_down(&kbd, DIGIT2_POS));
    }

    #[test]
    fn events_group_by_modifiers() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, 0, &[HID_KEY_A]);
        report(&mut kbd, &maps, 0, &[HID_KEY_A, HID_KEY_B]);
        report(&mut kbd, &maps, KEYBOARD_MODIFIER_LEFTSHIFT, &[HID_KEY_B]);
        assert_eq!(kbd.queued_events(), 3);

        // Both unshifted presses go together, then the shifted release alone.
        kbd.dispatch(&maps, G);
        assert_eq!(kbd.queued_events(), 1);
        assert!(!is_down(&kbd, LSHIFT_POS));
        kbd.dispatch(&maps, G);
        assert_eq!(kbd.queued_events(), 0);
        assert!(is_down(&kbd, LSHIFT_POS));
        assert!(!is_down(&kbd, A_POS));
        assert!(is_down(&kbd, GRAPHICS_ONLY_POS));
    }

    #[test]
    fn bare_modifier_changes_are_queued() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, KEYBOARD_MODIFIER_LEFTSHIFT, &[]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, LSHIFT_POS));

        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, 0, &[0x3A]);
        assert_eq!(kbd.queued_events(), 0);
        report(&mut kbd, &maps, 0, &[]);
        assert_eq!(kbd.queued_events(), 0);
    }

    #[test]
    fn caps_lock_holds_shift() {
        let (mut kbd, maps) = attached();
        assert_eq!(kbd.take_led_update(G), Some(KEYBOARD_LED_NUMLOCK | KEYBOARD_LED_SCROLLLOCK));

        report(&mut kbd, &maps, 0, &[HID_KEY_CAPS_LOCK]);
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert!(kbd.caps_lock());
        assert_eq!(
            kbd.take_led_update(G),
            Some(KEYBOARD_LED_CAPSLOCK | KEYBOARD_LED_NUMLOCK | KEYBOARD_LED_SCROLLLOCK)
        );
        assert_eq!(kbd.take_led_update(G), None);

        report(&mut kbd, &maps, 0, &[HID_KEY_A]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, LSHIFT_POS));
    }

    #[test]
    fn num_and_scroll_lock_switch_keymaps() {
        let (mut kbd, maps) = attached();
        kbd.take_led_update(G);

        report(&mut kbd, &maps, 0, &[HID_KEY_NUM_LOCK]);
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.effective_model(G), PetKeyboardModel::Business);
        assert_eq!(kbd.take_led_update(G), Some(KEYBOARD_LED_SCROLLLOCK));

        // The business keymap has nothing mapped.
        report(&mut kbd, &maps, 0, &[HID_KEY_B]);
        assert_eq!(kbd.queued_events(), 0);
        report(&mut kbd, &maps, 0, &[]);

        report(&mut kbd, &maps, 0, &[HID_KEY_SCROLL_LOCK]);
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.keymap_kind(), UsbKeymapKind::Positional);
        assert_eq!(kbd.take_led_update(G), Some(0));
    }

    #[test]
    fn roster_overflow_is_reported() {
        let mut kbd = UsbKeyboard::new();
        let maps = keymaps();
        for dev in 0..MAX_KEYBOARDS as u8 {
            kbd.handler(&maps, G).on_mount(dev + 1, 0);
        }
        assert!(!kbd.take_overflow());
        assert_eq!(kbd.attached().count(), MAX_KEYBOARDS);

        kbd.handler(&maps, G).on_mount(100, 0);
        assert!(kbd.take_overflow());
        assert!(!kbd.take_overflow());

        kbd.handler(&maps, G).on_unmount(1, 0);
        kbd.handler(&maps, G).on_mount(100, 0);
        assert!(!kbd.take_overflow());
    }

    #[test]
    fn unmount_releases_held_keys() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, 0, &[HID_KEY_A]);
        drain(&mut kbd, &maps);
        assert!(is_down(&kbd, A_POS));

        kbd.handler(&maps, G).on_unmount(1, 0);
        drain(&mut kbd, &maps);
        assert!(!is_down(&kbd, A_POS));
        assert_eq!(kbd.attached().count(), 0);
    }

    #[test]
    fn keyboards_diff_independently() {
        let (mut kbd, maps) = attached();
        kbd.handler(&maps, G).on_mount(2, 0);
        kbd.handler(&maps, G).on_report(1, 0, &KeyboardReport::new(0, &[HID_KEY_A]));
        kbd.handler(&maps, G).on_report(2, 0, &KeyboardReport::new(0, &[HID_KEY_B]));
        assert_eq!(kbd.queued_events(), 2);
    }

    #[test]
    fn full_queue_drops_events() {
        let (mut kbd, maps) = attached();
        for i in 0..KEY_EVENT_QUEUE_CAPACITY + 4 {
            let keys = if i % 2 == 0 { vec![HID_KEY_A] } else { vec![] };
            report(&mut kbd, &maps, 0, &keys);
        }
        assert_eq!(kbd.queued_events(), KEY_EVENT_QUEUE_CAPACITY);
        // Two presses are dropped. Their releases are never queued.
        assert_eq!(kbd.dropped_events(), 2);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);
    }

    #[test]
    fn release_waits_for_room_in_full_queue() {
        let (mut kbd, maps) = attached();
        report(&mut kbd, &maps, 0, &[HID_KEY_B]);
        for _ in 0..7 {
            report(&mut kbd, &maps, 0, &[HID_KEY_B, HID_KEY_A]);
            report(&mut kbd, &maps, 0, &[HID_KEY_B]);
        }
        report(&mut kbd, &maps, 0, &[HID_KEY_B, HID_KEY_A]);
        assert_eq!(kbd.queued_events(), KEY_EVENT_QUEUE_CAPACITY);

        // Both releases find the queue full.
        report(&mut kbd, &maps, 0, &[]);
        assert_eq!(kbd.dropped_events(), 2);

        let mut down = 0;
        let mut up = 0;
        while kbd.queued_events() > 0 {
            for ev in kbd.events.iter() {
                if ev.pressed {
                    down += 1;
                }
                else {
                    up += 1;
                }
            }
            // Consumes everything counted above, then queues the retried releases.
            kbd.dispatch(&maps, G);
        }
        assert_eq!(down, up);
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);
        assert!(!kbd.any_usb_key_down());
    }

    #[test]
    fn out_of_range_column_is_unmapped() {
        let (mut kbd, mut maps) = attached();
        const HID_KEY_C: u8 = HID_KEY_A + 2;
        maps.set_entry(G, UsbKeymapKind::Symbolic, HID_KEY_C as usize, UsbKeymapEntry::mapped(0, 12));
        report(&mut kbd, &maps, 0, &[HID_KEY_C]);
        drain(&mut kbd, &maps);
        report(&mut kbd, &maps, 0, &[]);
        drain(&mut kbd, &maps);
        assert_eq!(kbd.matrix(), &[0xFF; KEY_COL_COUNT]);
    }

    #[test]
    fn every_press_gets_one_release() {
        let (mut kbd, maps) = attached();
        let mut down = 0;
        let mut up = 0;
        let reports: [&[u8]; 6] = [&[HID_KEY_A], &[HID_KEY_A, HID_KEY_B], &[HID_KEY_B], &[], &[HID_KEY_B], &[]];
        for keys in reports {
            report(&mut kbd, &maps, 0, keys);
            while let Some(ev) = kbd.events.pop_front() {
                if ev.pressed {
                    down += 1;
                }
                else {
                    up += 1;
                }
            }
        }
        assert_eq!(down, 3);
        assert_eq!(up, 3);
    }
}
