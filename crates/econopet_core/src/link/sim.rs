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

    core::link::sim.rs

    A software model of the PLD side of the link.

    The model owns the full 20-bit address space as plain memory and
    overlays the register file, the keyboard matrix window and the CRTC
    register bank. It reproduces the read pipeline: the byte returned by a
    command is the one fetched by the previous command.

*/

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    error::LinkError,
    hw::*,
    link::bus::{AddrMode, CommandByte, LinkBus},
};

pub const SIM_MEMORY_SIZE: usize = 1 << LINK_ADDR_BITS;

struct SimState {
    memory:   Vec<u8>,
    addr:     u32,
    pending:  u8,
    selected: bool,
    stall:    u32,

    // Register file.
    status:        u8,
    cpu_history:   Vec<u8>,
    video_history: Vec<u8>,

    // Keyboard window. Writes land in the USB matrix; reads return the
    // matrix the PET sees, which also includes the physical keyboard.
    usb_matrix:      [u8; KEY_COL_COUNT],
    physical_matrix: [u8; KEY_COL_COUNT],

    // Per-address masks forcing bits on writes: (and, or).
    stuck: HashMap<u32, (u8, u8)>,

    record: bool,
    frames: Vec<Vec<u8>>,
}

impl SimState {
    fn load(&self, addr: u32) -> u8 {
        match addr {
            REG_STATUS => self.status,
            REG_CPU => self.cpu_history.last().copied().unwrap_or(0),
            REG_VIDEO => self.video_history.last().copied().unwrap_or(0),
            a if (ADDR_KBD..ADDR_KBD + KEY_COL_COUNT as u32).contains(&a) => {
                let i = (a - ADDR_KBD) as usize;
                self.usb_matrix[i] & self.physical_matrix[i]
            }
            a => self.memory[a as usize],
        }
    }

    fn store(&mut self, addr: u32, data: u8) {
        match addr {
            REG_STATUS => {}
            REG_CPU => self.cpu_history.push(data),
            REG_VIDEO => self.video_history.push(data),
            a if (ADDR_KBD..ADDR_KBD + KEY_COL_COUNT as u32).contains(&a) => {
                self.usb_matrix[(a - ADDR_KBD) as usize] = data;
            }
            a => {
                let data = match self.stuck.get(&a) {
                    Some((and, or)) => (data & and) | or,
                    None => data,
                };
                self.memory[a as usize] = data;
            }
        }
    }

    fn execute(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError> {
        let Some(first) = tx.first()
        else {
            return Err(LinkError::FrameLength(0));
        };
        let cmd = CommandByte::decode(*first);
        let expected = match (cmd.mode(), cmd.write()) {
            (AddrMode::At, false) => 3,
            (AddrMode::At, true) => 4,
            (_, false) => 1,
            (_, true) => 2,
        };
        if tx.len() != expected {
            return Err(LinkError::FrameLength(tx.len()));
        }

        if self.record {
            self.frames.push(tx.to_vec());
        }

        // Responses carry the byte fetched by the previous command.
        rx.fill(self.pending);

        self.addr = match cmd.mode() {
            AddrMode::At => ((cmd.addr_hi() as u32) << 16) | ((tx[1] as u32) << 8) | tx[2] as u32,
            AddrMode::Next => (self.addr + 1) & LINK_ADDR_MASK,
            AddrMode::Prev => self.addr.wrapping_sub(1) & LINK_ADDR_MASK,
            AddrMode::Same => self.addr,
        };

        // The fetch for this address happens before any write to it.
        self.pending = self.load(self.addr);
        if cmd.write() {
            self.store(self.addr, tx[expected - 1]);
        }
        Ok(())
    }
}

/// Cloneable handle to a simulated PLD. All clones share one target.
#[derive(Clone)]
pub struct SimTarget {
    inner: Arc<Mutex<SimState>>,
}

impl SimTarget {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                memory: vec![0; SIM_MEMORY_SIZE],
                addr: 0,
                pending: 0,
                selected: false,
                stall: 0,
                status: 0,
                cpu_history: Vec::new(),
                video_history: Vec::new(),
                usb_matrix: [0xFF; KEY_COL_COUNT],
                physical_matrix: [0xFF; KEY_COL_COUNT],
                stuck: HashMap::new(),
                record: false,
                frames: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock only happens in a failing test.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn peek(&self, addr: u32) -> u8 {
        self.lock().load(addr)
    }

    pub fn peek_range(&self, addr: u32, len: usize) -> Vec<u8> {
        let state = self.lock();
        (0..len as u32).map(|i| state.load(addr + i)).collect()
    }

    pub fn poke(&self, addr: u32, data: u8) {
        self.lock().store(addr, data);
    }

    pub fn poke_range(&self, addr: u32, data: &[u8]) {
        let mut state = self.lock();
        for (i, b) in data.iter().enumerate() {
            state.store(addr + i as u32, *b);
        }
    }

    /// Set the DIP switch / status register value.
    pub fn set_status(&self, status: u8) {
        self.lock().status = status;
    }

    pub fn cpu_history(&self) -> Vec<u8> {
        self.lock().cpu_history.clone()
    }

    pub fn video_history(&self) -> Vec<u8> {
        self.lock().video_history.clone()
    }

    pub fn usb_matrix(&self) -> [u8; KEY_COL_COUNT] {
        self.lock().usb_matrix
    }

    /// Press (or release) a key on the PET's own keyboard. The matrix is
    /// stored one byte per column, one bit per row, active low.
    pub fn set_physical_key(&self, row: u8, col: u8, pressed: bool) {
        let mut state = self.lock();
        let bit = 1u8 << row;
        if pressed {
            state.physical_matrix[col as usize] &= !bit;
        }
        else {
            state.physical_matrix[col as usize] |= bit;
        }
    }

    /// Force bit `bit` of `addr` to `value` on every write.
    pub fn set_stuck_bit(&self, addr: u32, bit: u8, value: bool) {
        let mut state = self.lock();
        let (and, or) = if value { (0xFF, 1 << bit) } else { (!(1u8 << bit), 0) };
        state.stuck.insert(addr, (and, or));
        let current = state.memory[addr as usize];
        state.memory[addr as usize] = (current & and) | or;
    }

    /// Hold STALL high for the next `polls` checks.
    pub fn stall_for(&self, polls: u32) {
        self.lock().stall = polls;
    }

    pub fn record_frames(&self, record: bool) {
        self.lock().record = record;
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    pub fn selected(&self) -> bool {
        self.lock().selected
    }
}

impl Default for SimTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkBus for SimTarget {
    fn stalled(&mut self) -> bool {
        let mut state = self.lock();
        if state.stall > 0 {
            state.stall -= 1;
            true
        }
        else {
            false
        }
    }

    fn select(&mut self, active: bool) {
        self.lock().selected = active;
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError> {
        let mut state = self.lock();
        if !state.selected {
            return Err(LinkError::Target("transfer without chip select".into()));
        }
        state.execute(tx, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_frames() {
        let mut sim = SimTarget::new();
        let mut rx = [0u8; 4];
        sim.select(true);
        assert_eq!(sim.transfer(&[0x40, 0x00], &mut rx[..2]), Err(LinkError::FrameLength(2)));
        assert_eq!(sim.transfer(&[0xA0], &mut rx[..1]), Err(LinkError::FrameLength(1)));
        sim.select(false);
        assert!(sim.transfer(&[0x20], &mut rx[..1]).is_err());
    }

    #[test]
    fn keyboard_window_merges_physical_keys() {
        let sim = SimTarget::new();
        sim.poke(ADDR_KBD + 2, 0b1111_1110);
        sim.set_physical_key(3, 2, true);
        assert_eq!(sim.peek(ADDR_KBD + 2), 0b1111_0110);
        assert_eq!(sim.usb_matrix()[2], 0b1111_1110);
        sim.set_physical_key(3, 2, false);
        assert_eq!(sim.peek(ADDR_KBD + 2), 0b1111_1110);
    }

    #[test]
    fn stuck_bits_survive_writes() {
        let sim = SimTarget::new();
        sim.set_stuck_bit(0x10, 3, true);
        sim.poke(0x10, 0x00);
        assert_eq!(sim.peek(0x10), 0x08);
        sim.set_stuck_bit(0x11, 0, false);
        sim.poke(0x11, 0xFF);
        assert_eq!(sim.peek(0x11), 0xFE);
    }
}
