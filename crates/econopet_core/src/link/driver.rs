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

    core::link::driver.rs

    Link driver.

    The PLD pipelines reads: every command's response carries the byte
    fetched by the previous command, while the current command queues the
    next fetch. Callers must account for this one-transaction lag; block
    operations below already do.

*/

use crate::{
    error::LinkError,
    hw::LINK_ADDR_MASK,
    link::bus::{AddrMode, CommandByte, LinkBus},
    scratch::ScratchBuffer,
};

const STALL_SPIN_LIMIT: u32 = 1_000_000;

/// Where the target's address pointer is believed to be.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LinkState {
    /// Address of the read the target has queued. `None` until the first
    /// absolute command.
    pub addr: Option<u32>,
    pub transactions: u64,
}

impl LinkState {
    /// Next state after issuing a command with the given addressing mode.
    pub fn advance(self, mode: AddrMode, addr: u32) -> LinkState {
        let addr = match mode {
            AddrMode::At => Some(addr & LINK_ADDR_MASK),
            AddrMode::Next => self.addr.map(|a| (a + 1) & LINK_ADDR_MASK),
            AddrMode::Prev => self.addr.map(|a| a.wrapping_sub(1) & LINK_ADDR_MASK),
            AddrMode::Same => self.addr,
        };
        LinkState {
            addr,
            transactions: self.transactions + 1,
        }
    }
}

pub struct Link {
    bus:   Box<dyn LinkBus>,
    state: LinkState,
}

impl Link {
    pub fn new(bus: Box<dyn LinkBus>) -> Self {
        Self {
            bus,
            state: LinkState::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    fn wait_stall(&mut self) -> Result<(), LinkError> {
        let mut spins = 0;
        while self.bus.stalled() {
            spins += 1;
            if spins >= STALL_SPIN_LIMIT {
                return Err(LinkError::Stalled);
            }
            std::hint::spin_loop();
        }
        Ok(())
    }

    /// Run one CS-framed transaction and return the last received byte.
    fn command(&mut self, write: bool, mode: AddrMode, addr: u32, data: Option<u8>) -> Result<u8, LinkError> {
        if addr > LINK_ADDR_MASK {
            return Err(LinkError::AddressRange(addr));
        }
        if mode != AddrMode::At {
            debug_assert!(self.state.addr.is_some(), "relative link command before any seek");
        }

        let mut tx = [0u8; 4];
        let mut len = 0;
        tx[len] = CommandByte::encode(write, mode, addr);
        len += 1;
        if mode == AddrMode::At {
            tx[len] = (addr >> 8) as u8;
            tx[len + 1] = addr as u8;
            len += 2;
        }
        if let Some(data) = data {
            tx[len] = data;
            len += 1;
        }
        let mut rx = [0u8; 4];

        self.wait_stall()?;
        self.bus.select(true);
        let result = self.bus.transfer(&tx[..len], &mut rx[..len]);
        let end = self.wait_stall();
        self.bus.select(false);
        result?;
        end?;

        self.state = self.state.advance(mode, addr);
        Ok(rx[len - 1])
    }

    /// Queue a read of `addr`. The value arrives with the next command.
    pub fn seek(&mut self, addr: u32) -> Result<(), LinkError> {
        self.command(false, AddrMode::At, addr, None).map(|_| ())
    }

    pub fn read_at(&mut self, addr: u32) -> Result<u8, LinkError> {
        self.seek(addr)?;
        self.read_next()
    }

    pub fn read_next(&mut self) -> Result<u8, LinkError> {
        self.command(false, AddrMode::Next, 0, None)
    }

    pub fn read_prev(&mut self) -> Result<u8, LinkError> {
        self.command(false, AddrMode::Prev, 0, None)
    }

    pub fn read_same(&mut self) -> Result<u8, LinkError> {
        self.command(false, AddrMode::Same, 0, None)
    }

    /// Writes return the byte fetched by the previous command, which is only
    /// meaningful if that command queued a read.
    pub fn write_at(&mut self, addr: u32, data: u8) -> Result<u8, LinkError> {
        self.command(true, AddrMode::At, addr, Some(data))
    }

    pub fn write_next(&mut self, data: u8) -> Result<u8, LinkError> {
        self.command(true, AddrMode::Next, 0, Some(data))
    }

    pub fn write_prev(&mut self, data: u8) -> Result<u8, LinkError> {
        self.command(true, AddrMode::Prev, 0, Some(data))
    }

    pub fn write_same(&mut self, data: u8) -> Result<u8, LinkError> {
        self.command(true, AddrMode::Same, 0, Some(data))
    }

    pub fn read(&mut self, addr: u32, dst: &mut [u8]) -> Result<(), LinkError> {
        self.seek(addr)?;
        for byte in dst.iter_mut() {
            *byte = self.read_next()?;
        }
        Ok(())
    }

    pub fn write(&mut self, addr: u32, src: &[u8]) -> Result<(), LinkError> {
        let Some((first, rest)) = src.split_first()
        else {
            return Ok(());
        };
        self.write_at(addr, *first)?;
        for byte in rest {
            self.write_next(*byte)?;
        }
        Ok(())
    }

    /// Write `src` at `addr` while capturing the bytes previously stored
    /// there into `dst`.
    pub fn write_read(&mut self, addr: u32, src: &[u8], dst: &mut [u8]) -> Result<(), LinkError> {
        assert_eq!(src.len(), dst.len());
        let Some((first, rest)) = src.split_first()
        else {
            return Ok(());
        };
        self.write_at(addr, *first)?;
        for (i, byte) in rest.iter().enumerate() {
            dst[i] = self.write_next(*byte)?;
        }
        dst[src.len() - 1] = self.read_next()?;
        Ok(())
    }

    /// Fill `len` bytes at `addr` with `byte`, staged through the scratch
    /// buffer one chunk at a time.
    pub fn fill(&mut self, addr: u32, byte: u8, len: usize, scratch: &mut ScratchBuffer) -> Result<(), LinkError> {
        if len == 0 {
            return Ok(());
        }
        let mut buf = scratch.acquire("link_fill");
        let chunk_len = len.min(buf.len());
        buf[..chunk_len].fill(byte);

        let mut addr = addr;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(chunk_len);
            self.write(addr, &buf[..n])?;
            addr += n as u32;
            remaining -= n;
        }
        Ok(())
    }
}
