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

    core::memtest.rs

    Extended March C- test of PLD memory.

    The test walks every bit of every byte through the pipelined link
    primitives so that each address is only sent once per element.

*/

use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::{
    error::{FwResult, LinkError},
    hw::{ADDR_CHAR_ROM, RAM_ADDR_MAX, RAM_ADDR_MIN},
    link::Link,
    scratch::ScratchBuffer,
};

#[derive(Error, Clone, Debug, PartialEq)]
pub enum MemTestError {
    #[error("${addr:05X}[{bit}]: Expected {expected}, but got {actual} (byte read: {byte:08b})")]
    Bit { addr: u32, bit: u8, expected: u8, actual: u8, byte: u8 },
    #[error("${addr:05X}: Expected {expected:08b}, but got {actual:08b}")]
    Byte { addr: u32, expected: u8, actual: u8 },
}

/// What to do when a cell reads back wrong.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum OnFailure {
    #[default]
    Abort,
    Continue,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MemRegion {
    pub name:  &'static str,
    pub start: u32,
    /// Inclusive.
    pub end:   u32,
}

impl MemRegion {
    pub const fn new(name: &'static str, start: u32, end: u32) -> Self {
        Self { name, start, end }
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Main RAM behind the PET's address space.
pub const SRAM: MemRegion = MemRegion::new("SRAM", RAM_ADDR_MIN, RAM_ADDR_MAX);
/// Block RAM inside the PLD holding the character ROM mirror.
pub const BRAM: MemRegion = MemRegion::new("BRAM", ADDR_CHAR_ROM, ADDR_CHAR_ROM + 0xFFF);

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq)]
pub enum MarchElement {
    #[strum(to_string = "⇕(w0)")]
    W0,
    #[strum(to_string = "⇑(r0,w1,r1)")]
    UpR0W1R1,
    #[strum(to_string = "⇑(r1,w0)")]
    UpR1W0,
    #[strum(to_string = "⇓(r0,w1)")]
    DownR0W1,
    #[strum(to_string = "⇓(r1,w0)")]
    DownR1W0,
    #[strum(to_string = "⇕(r0)")]
    R0,
}

#[derive(Copy, Clone, PartialEq)]
enum Direction {
    Up,
    Down,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemTestReport {
    pub failures: Vec<MemTestError>,
}

impl MemTestReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

struct MarchRun<'a> {
    link:     &'a mut Link,
    mode:     OnFailure,
    failures: Vec<MemTestError>,
}

impl MarchRun<'_> {
    fn report(&mut self, err: MemTestError) -> FwResult<()> {
        log::warn!("{}", err);
        match self.mode {
            OnFailure::Abort => Err(err.into()),
            OnFailure::Continue => {
                self.failures.push(err);
                Ok(())
            }
        }
    }

    fn check_bit(&mut self, addr: u32, byte: u8, bit: u8, expected: u8) -> FwResult<()> {
        let actual = (byte >> bit) & 1;
        if actual != expected {
            self.report(MemTestError::Bit {
                addr,
                bit,
                expected,
                actual,
                byte,
            })?;
        }
        Ok(())
    }

    /// Leave `addr` for its neighbour in `dir`. Returns the byte fetched by
    /// the previous command.
    fn advance(&mut self, region: &MemRegion, addr: u32, dir: Direction) -> Result<u8, LinkError> {
        match dir {
            Direction::Up if addr != region.end => self.link.read_next(),
            Direction::Down if addr != region.start => self.link.read_prev(),
            _ => self.link.read_same(),
        }
    }

    /// One bit-oriented element: read expecting `expect`, write its
    /// complement and optionally read it back.
    ///
    /// On entry to each bit the link's pending read holds the current value
    /// of `addr`. A write fetches before it stores, so every write is chased
    /// with a read to refresh the pipeline.
    fn bit_element(&mut self, region: &MemRegion, dir: Direction, expect: u8, verify: bool) -> FwResult<()> {
        let bits: [u8; 8] = match dir {
            Direction::Up => [0, 1, 2, 3, 4, 5, 6, 7],
            Direction::Down => [7, 6, 5, 4, 3, 2, 1, 0],
        };
        let mut addr = match dir {
            Direction::Up => region.start,
            Direction::Down => region.end,
        };
        self.link.seek(addr)?;

        loop {
            for (i, bit) in bits.iter().copied().enumerate() {
                let last = i == bits.len() - 1;
                let byte = self.link.read_same()?;
                self.check_bit(addr, byte, bit, expect)?;
                self.link.write_same(byte ^ (1 << bit))?;

                if verify {
                    self.link.read_same()?;
                    let byte = if last {
                        self.advance(region, addr, dir)?
                    }
                    else {
                        self.link.read_same()?
                    };
                    self.check_bit(addr, byte, bit, expect ^ 1)?;
                }
                else if last {
                    self.advance(region, addr, dir)?;
                }
                else {
                    self.link.read_same()?;
                }
            }

            match dir {
                Direction::Up if addr < region.end => addr += 1,
                Direction::Down if addr > region.start => addr -= 1,
                _ => return Ok(()),
            }
        }
    }

    fn element(&mut self, scratch: &mut ScratchBuffer, region: &MemRegion, element: MarchElement) -> FwResult<()> {
        match element {
            MarchElement::W0 => self.link.fill(region.start, 0, region.len(), scratch)?,
            MarchElement::UpR0W1R1 => self.bit_element(region, Direction::Up, 0, true)?,
            MarchElement::UpR1W0 => self.bit_element(region, Direction::Up, 1, false)?,
            MarchElement::DownR0W1 => self.bit_element(region, Direction::Down, 0, false)?,
            MarchElement::DownR1W0 => self.bit_element(region, Direction::Down, 1, false)?,
            MarchElement::R0 => {
                self.link.seek(region.start)?;
                for addr in region.start..=region.end {
                    let actual = self.link.read_next()?;
                    if actual != 0 {
                        self.report(MemTestError::Byte {
                            addr,
                            expected: 0,
                            actual,
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Run one pass of Extended March C- over `region`:
/// `⇕(w0); ⇑(r0,w1,r1); ⇑(r1,w0); ⇓(r0,w1); ⇓(r1,w0); ⇕(r0)`.
///
/// With [`OnFailure::Abort`] the first mismatch is returned as an error.
/// With [`OnFailure::Continue`] every mismatch is logged and collected.
pub fn march_c_minus(
    link: &mut Link,
    scratch: &mut ScratchBuffer,
    region: &MemRegion,
    mode: OnFailure,
) -> FwResult<MemTestReport> {
    use strum::IntoEnumIterator;

    log::info!(
        "RAM Test (Extended March C-): {} ${:05X}-${:05X}",
        region.name,
        region.start,
        region.end
    );

    let mut run = MarchRun {
        link,
        mode,
        failures: Vec::new(),
    };
    for element in MarchElement::iter() {
        let before = run.failures.len();
        run.element(scratch, region, element)?;
        if run.failures.len() == before {
            log::info!("{}: OK", element);
        }
        else {
            log::warn!("{}: {} failures", element, run.failures.len() - before);
        }
    }
    Ok(MemTestReport { failures: run.failures })
}

/// Test every region in turn.
pub fn test_ram(
    link: &mut Link,
    scratch: &mut ScratchBuffer,
    regions: &[MemRegion],
    mode: OnFailure,
) -> FwResult<MemTestReport> {
    let mut report = MemTestReport::default();
    for region in regions {
        report.failures.extend(march_c_minus(link, scratch, region, mode)?.failures);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FirmwareError, link::SimTarget};

    const SMALL: MemRegion = MemRegion::new("test", 0x0100, 0x013F);

    fn setup() -> (Link, SimTarget, ScratchBuffer) {
        let sim = SimTarget::new();
        (Link::new(Box::new(sim.clone())), sim, ScratchBuffer::new())
    }

    #[test]
    fn regions_cover_ram_and_char_rom() {
        assert_eq!(SRAM.len(), 128 * 1024);
        assert_eq!(BRAM.len(), 4096);
        assert!(!SMALL.is_empty());
    }

    #[test]
    fn healthy_memory_passes_and_ends_zeroed() {
        let (mut link, sim, mut scratch) = setup();
        sim.poke_range(SMALL.start, &[0xA5; 64]);
        sim.poke(SMALL.end + 1, 0x5A);

        let report = march_c_minus(&mut link, &mut scratch, &SMALL, OnFailure::Abort).unwrap();
        assert!(report.passed());
        assert_eq!(sim.peek_range(SMALL.start, SMALL.len()), vec![0; SMALL.len()]);
        // Neighbours are left alone.
        assert_eq!(sim.peek(SMALL.end + 1), 0x5A);
        assert_eq!(scratch.owner(), None);
    }

    #[test]
    fn stuck_at_one_aborts() {
        let (mut link, sim, mut scratch) = setup();
        sim.set_stuck_bit(0x0120, 3, true);

        let err = march_c_minus(&mut link, &mut scratch, &SMALL, OnFailure::Abort).unwrap_err();
        match err {
            FirmwareError::MemTest(MemTestError::Bit { addr, bit, expected, actual, .. }) => {
                assert_eq!((addr, bit, expected, actual), (0x0120, 3, 0, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!FirmwareError::from(MemTestError::Byte { addr: 0, expected: 0, actual: 1 }).is_fatal());
    }

    #[test]
    fn stuck_at_zero_is_collected_when_continuing() {
        let (mut link, sim, mut scratch) = setup();
        sim.set_stuck_bit(0x0130, 6, false);

        let report = test_ram(&mut link, &mut scratch, &[SMALL], OnFailure::Continue).unwrap();
        assert!(!report.passed());
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f, MemTestError::Bit { addr: 0x0130, bit: 6, .. })));
    }

    #[test]
    fn element_names() {
        assert_eq!(MarchElement::UpR0W1R1.to_string(), "⇑(r0,w1,r1)");
        assert_eq!(MarchElement::R0.to_string(), "⇕(r0)");
    }
}
