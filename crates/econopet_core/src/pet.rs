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

    core::pet.rs

    Control of the emulated PET: CPU reset/NMI pulses, the menu ROM and
    PRG loading.

*/

use std::sync::Arc;

use crate::{
    actions::read_keymap,
    error::{FsError, FwResult, LinkError},
    fs::{sd_open, sd_read, sd_read_file, FileSystem},
    hal::Clock,
    hw::{ADDR_CHAR_ROM, FONT_ROM_SIZE, PET_MENU_ROM},
    link::Link,
    registers::{read_pet_model, set_cpu, write_pet_model},
    scratch::ScratchBuffer,
    state::{DisplayColumns, SystemState},
};

/// The W65C02S needs two 1 MHz clocks to register a reset.
pub const CPU_PULSE_US: u64 = 4;

pub const MENU_KEYMAP_PATH: &str = "/ukm/us.bin";
pub const MENU_ROM_PATH: &str = "/roms/menu.bin";
pub const CHAR_ROM_PATH: &str = "/roms/characters.bin";

pub const MENU_ROM_SIZE: usize = 0x100;

// BASIC end-of-program pointers.
const BASIC_VARTAB: u32 = 0x2A;
const BASIC_EAL: u32 = 0xC9;

/// Entry point the menu ROM boots into. Each reason is a jump table entry
/// at the start of the ROM.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MenuRomBoot {
    Normal = 0,
    Error = 1,
}

impl MenuRomBoot {
    pub fn entry(self) -> u16 {
        PET_MENU_ROM as u16 + 3 * self as u16
    }
}

/// Pulse RESET with the CPU held off the bus.
pub fn pet_reset(link: &mut Link, clock: &dyn Clock) -> Result<(), LinkError> {
    set_cpu(link, false, false, false)?;
    clock.sleep_us(CPU_PULSE_US);
    set_cpu(link, false, true, false)?;
    clock.sleep_us(CPU_PULSE_US);
    set_cpu(link, true, false, false)
}

/// Pulse NMI with the CPU held off the bus.
pub fn pet_nmi(link: &mut Link, clock: &dyn Clock) -> Result<(), LinkError> {
    set_cpu(link, false, false, false)?;
    clock.sleep_us(CPU_PULSE_US);
    set_cpu(link, false, false, true)?;
    clock.sleep_us(CPU_PULSE_US);
    set_cpu(link, true, false, false)
}

/// The images the firmware itself places in PET memory.
#[derive(Clone)]
pub struct Roms {
    pub menu:  Vec<u8>,
    pub chars: Arc<[u8]>,
}

impl Roms {
    /// A menu ROM that parks the CPU in a loop and a blank character set.
    pub fn builtin() -> Self {
        let mut menu = vec![0xEA; MENU_ROM_SIZE];
        let idle = PET_MENU_ROM as u16 + 6;
        // Jump table. The third entry is the idle loop itself.
        for entry in 0..3 {
            let o = entry * 3;
            menu[o] = 0x4C; // JMP abs
            menu[o + 1] = idle as u8;
            menu[o + 2] = (idle >> 8) as u8;
        }
        for (o, vector) in [(0xFA, idle), (0xFC, MenuRomBoot::Normal.entry()), (0xFE, idle)] {
            menu[o] = vector as u8;
            menu[o + 1] = (vector >> 8) as u8;
        }
        Self {
            menu,
            chars: vec![0u8; FONT_ROM_SIZE].into(),
        }
    }

    /// Read the images from the card, falling back to [`Roms::builtin`] for
    /// any that are missing.
    pub fn load(fs: &mut dyn FileSystem, scratch: &mut ScratchBuffer) -> Self {
        let mut roms = Self::builtin();
        match read_image(fs, scratch, MENU_ROM_PATH, MENU_ROM_SIZE) {
            Ok(image) => roms.menu = image,
            Err(e) => log::warn!("menu ROM: {}, using built-in", e),
        }
        match read_image(fs, scratch, CHAR_ROM_PATH, FONT_ROM_SIZE) {
            Ok(image) => roms.chars = image.into(),
            Err(e) => log::warn!("character ROM: {}, using blank font", e),
        }
        roms
    }
}

fn read_image(fs: &mut dyn FileSystem, scratch: &mut ScratchBuffer, path: &str, size: usize) -> FwResult<Vec<u8>> {
    let mut image = vec![0u8; size];
    sd_read_file(fs, scratch, path, size, |offset, page| {
        image[offset..offset + page.len()].copy_from_slice(page);
        Ok::<(), FsError>(())
    })?;
    Ok(image)
}

/// The hardware the menu ROM start touches.
pub struct PetIo<'a> {
    pub link:    &'a mut Link,
    pub clock:   &'a dyn Clock,
    pub fs:      &'a mut dyn FileSystem,
    pub scratch: &'a mut ScratchBuffer,
}

/// Halt the PET, put it in a 40 column 1 KiB video mode, load the menu ROM
/// and character set, and restart it at the entry for `reason`.
pub fn start_menu_rom(io: &mut PetIo<'_>, state: &mut SystemState, roms: &Roms, reason: MenuRomBoot) -> FwResult<()> {
    set_cpu(io.link, false, false, false)?;
    read_pet_model(io.link, state)?;

    state.set_display_columns(DisplayColumns::Forty);
    state.set_video_ram_mask(0);
    write_pet_model(io.link, state)?;

    // Menu navigation only needs the cursor keys, so any keymap will do.
    if let Err(e) = read_keymap(io.fs, io.scratch, MENU_KEYMAP_PATH, &mut state.keymaps) {
        log::warn!("{}", e);
    }

    let mut menu = roms.menu.clone();
    let entry = reason.entry();
    if menu.len() == MENU_ROM_SIZE {
        menu[0xFC] = entry as u8;
        menu[0xFD] = (entry >> 8) as u8;
    }
    io.link.write(PET_MENU_ROM, &menu)?;
    io.link.write(ADDR_CHAR_ROM, &roms.chars)?;
    log::debug!("menu ROM: {:?} at ${:04X}", reason, entry);

    pet_reset(io.link, io.clock)?;
    Ok(())
}

/// Load a PRG file: a little-endian load address followed by the program.
/// The BASIC end-of-program pointers are set past the loaded bytes.
/// Returns the load address and length.
pub fn load_prg(io: &mut PetIo<'_>, path: &str) -> FwResult<(u16, usize)> {
    let mut file = sd_open(io.fs, path)?;
    let mut header = [0u8; 2];
    if sd_read(path, &mut file, &mut header)? < header.len() {
        log::warn!("'{}' has no load address", path);
        return Ok((0, 0));
    }
    let start = u16::from_le_bytes(header);

    let mut buf = io.scratch.acquire("load_prg");
    let mut addr = start as u32;
    let mut total = 0;
    loop {
        let n = sd_read(path, &mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        io.link.write(addr, &buf[..n])?;
        addr += n as u32;
        total += n;
    }

    let end = (total as u16).wrapping_add(0x3FF);
    let [lo, hi] = end.to_le_bytes();
    io.link.write(BASIC_VARTAB, &[lo, hi])?;
    io.link.write(BASIC_EAL, &[lo, hi])?;

    log::info!("{}: ${:04X}-${:04X}", path, start, addr.wrapping_sub(1));
    Ok((start, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::MemFs,
        hal::ManualClock,
        link::SimTarget,
        state::{PetKeyboardModel, PetVideoType},
    };

    struct Rig {
        sim: SimTarget,
        link: Link,
        clock: ManualClock,
        fs: MemFs,
        scratch: ScratchBuffer,
    }

    impl Rig {
        fn new() -> Self {
            let sim = SimTarget::new();
            Rig {
                link: Link::new(Box::new(sim.clone())),
                sim,
                clock: ManualClock::new(0),
                fs: MemFs::new(),
                scratch: ScratchBuffer::new(),
            }
        }

        fn io(&mut self) -> PetIo<'_> {
            PetIo {
                link: &mut self.link,
                clock: &self.clock,
                fs: &mut self.fs,
                scratch: &mut self.scratch,
            }
        }
    }

    #[test]
    fn reset_pulse_sequence() {
        let mut rig = Rig::new();
        pet_reset(&mut rig.link, &rig.clock).unwrap();
        assert_eq!(rig.sim.cpu_history(), vec![0b000, 0b010, 0b001]);
        assert_eq!(rig.clock.now_us(), 2 * CPU_PULSE_US);

        pet_nmi(&mut rig.link, &rig.clock).unwrap();
        assert_eq!(&rig.sim.cpu_history()[3..], &[0b000, 0b100, 0b001]);
    }

    #[test]
    fn builtin_menu_rom_vectors() {
        let roms = Roms::builtin();
        assert_eq!(roms.menu.len(), MENU_ROM_SIZE);
        assert_eq!(&roms.menu[0..3], &[0x4C, 0x06, 0xFF]);
        assert_eq!(&roms.menu[0xFC..0xFE], &[0x00, 0xFF]);
        assert_eq!(roms.chars.len(), FONT_ROM_SIZE);
        assert_eq!(MenuRomBoot::Error.entry(), 0xFF03);
    }

    #[test]
    fn roms_load_from_card_when_present() {
        let mut rig = Rig::new();
        rig.fs.insert(CHAR_ROM_PATH, vec![0x3C; FONT_ROM_SIZE]);
        let roms = Roms::load(&mut rig.fs, &mut rig.scratch);
        assert_eq!(roms.chars[0], 0x3C);
        assert_eq!(roms.menu, Roms::builtin().menu);
    }

    #[test]
    fn menu_rom_start_resets_video_mode() {
        let mut rig = Rig::new();
        rig.sim.set_status(0b000); // business keyboard, CRTC
        let mut state = SystemState::new();
        state.set_display_columns(DisplayColumns::Eighty);
        state.set_video_ram_mask(3);
        let roms = Roms::builtin();

        start_menu_rom(&mut rig.io(), &mut state, &roms, MenuRomBoot::Error).unwrap();

        assert_eq!(state.display_columns(), DisplayColumns::Forty);
        assert_eq!(state.video_ram_mask(), 0);
        assert_eq!(state.pet_keyboard_model, PetKeyboardModel::Business);
        assert_eq!(state.pet_video_type, PetVideoType::Crtc);
        assert_eq!(rig.sim.video_history().last(), Some(&0));
        assert_eq!(rig.sim.peek(0xFFFC), 0x03);
        assert_eq!(rig.sim.peek(0xFFFD), 0xFF);
        assert_eq!(rig.sim.peek(0xFF00), 0x4C);
        // Ends with the CPU running.
        assert_eq!(rig.sim.cpu_history().last(), Some(&0b001));
    }

    #[test]
    fn prg_loads_at_header_address() {
        let mut rig = Rig::new();
        let mut prg = vec![0x01, 0x04];
        prg.extend((0..300).map(|i| i as u8));
        rig.fs.insert("/prg/hello.prg", prg);

        let (start, len) = load_prg(&mut rig.io(), "/prg/hello.prg").unwrap();
        assert_eq!((start, len), (0x0401, 300));
        assert_eq!(rig.sim.peek_range(0x0401, 300), (0..300).map(|i| i as u8).collect::<Vec<_>>());

        let end = (300u16 + 0x3FF).to_le_bytes();
        assert_eq!(rig.sim.peek_range(0x2A, 2), end.to_vec());
        assert_eq!(rig.sim.peek_range(0xC9, 2), end.to_vec());
    }
}
