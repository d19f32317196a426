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

    core::link::bus.rs

    Command byte encoding and the bus abstraction the link driver talks to.

    Every transaction starts with a command byte laid out as `WMd_AAAA`:
    W selects write, Md the addressing mode, and AAAA holds address bits
    19:16 when the mode carries an absolute address.

*/

use modular_bitfield::{bitfield, prelude::*};

use crate::error::LinkError;

#[derive(Copy, Clone, Debug, PartialEq, BitfieldSpecifier)]
#[bits = 2]
pub enum AddrMode {
    Same,
    Next,
    At,
    Prev,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct CommandByte {
    pub addr_hi: B4,
    #[skip]
    unused: B1,
    pub mode: AddrMode,
    pub write: bool,
}

impl CommandByte {
    pub fn encode(write: bool, mode: AddrMode, addr: u32) -> u8 {
        let addr_hi = if mode == AddrMode::At { ((addr >> 16) & 0x0F) as u8 } else { 0 };
        CommandByte::new()
            .with_write(write)
            .with_mode(mode)
            .with_addr_hi(addr_hi)
            .into_bytes()[0]
    }

    pub fn decode(byte: u8) -> CommandByte {
        CommandByte::from_bytes([byte])
    }
}

pub const CMD_READ_AT: u8 = 0x40;
pub const CMD_READ_NEXT: u8 = 0x20;
pub const CMD_READ_PREV: u8 = 0x60;
pub const CMD_READ_SAME: u8 = 0x00;
pub const CMD_WRITE_AT: u8 = 0xC0;
pub const CMD_WRITE_NEXT: u8 = 0xA0;
pub const CMD_WRITE_PREV: u8 = 0xE0;
pub const CMD_WRITE_SAME: u8 = 0x80;

/// The SPI peripheral together with the chip-select output and STALL input.
pub trait LinkBus: Send {
    /// True while the target holds STALL high.
    fn stalled(&mut self) -> bool;
    /// Drive chip select. `true` asserts it (pin low).
    fn select(&mut self, active: bool);
    /// Full-duplex transfer. `rx` has the same length as `tx`.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_match_wire_encoding() {
        assert_eq!(CommandByte::encode(false, AddrMode::At, 0), CMD_READ_AT);
        assert_eq!(CommandByte::encode(false, AddrMode::Next, 0), CMD_READ_NEXT);
        assert_eq!(CommandByte::encode(false, AddrMode::Prev, 0), CMD_READ_PREV);
        assert_eq!(CommandByte::encode(false, AddrMode::Same, 0), CMD_READ_SAME);
        assert_eq!(CommandByte::encode(true, AddrMode::At, 0), CMD_WRITE_AT);
        assert_eq!(CommandByte::encode(true, AddrMode::Next, 0), CMD_WRITE_NEXT);
        assert_eq!(CommandByte::encode(true, AddrMode::Prev, 0), CMD_WRITE_PREV);
        assert_eq!(CommandByte::encode(true, AddrMode::Same, 0), CMD_WRITE_SAME);
    }

    #[test]
    fn absolute_modes_carry_high_address_bits() {
        assert_eq!(CommandByte::encode(false, AddrMode::At, 0x5_1234), 0x45);
        assert_eq!(CommandByte::encode(true, AddrMode::At, 0xF_0000), 0xCF);
        // Relative modes never carry an address.
        assert_eq!(CommandByte::encode(true, AddrMode::Next, 0xF_0000), CMD_WRITE_NEXT);

        let cmd = CommandByte::decode(0xC6);
        assert!(cmd.write());
        assert_eq!(cmd.mode(), AddrMode::At);
        assert_eq!(cmd.addr_hi(), 6);
    }
}
