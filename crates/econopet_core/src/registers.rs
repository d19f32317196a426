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

    core::registers.rs

    PLD control registers: status (DIP switches), CPU control and video
    control, plus the per-iteration state exchange with the PLD.

*/

use modular_bitfield::{bitfield, prelude::*};

use crate::{
    error::LinkError,
    hw::{ADDR_CRTC, ADDR_KBD, CRTC_REG_COUNT, KEY_COL_COUNT, REG_CPU, REG_STATUS, REG_VIDEO},
    link::Link,
    state::{DisplayColumns, PetKeyboardModel, PetVideoType, SystemState},
};

/// Status register. The DIP switches are active low.
#[bitfield]
#[derive(Copy, Clone)]
pub struct StatusRegister {
    /// Graphics (lower case) character set selected by the PET.
    pub graphics: bool,
    /// 0 = CRTC, 1 = fixed-timing display.
    pub crt_fixed: bool,
    /// 0 = business keyboard, 1 = graphics keyboard.
    pub keyboard_graphics: bool,
    #[skip]
    unused: B5,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct CpuControlRegister {
    pub ready: bool,
    pub reset: bool,
    pub nmi: bool,
    #[skip]
    unused: B5,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct VideoControlRegister {
    pub columns_80: bool,
    pub ram_mask: B2,
    #[skip]
    unused: B5,
}

pub fn set_cpu(link: &mut Link, ready: bool, reset: bool, nmi: bool) -> Result<(), LinkError> {
    let reg = CpuControlRegister::new().with_ready(ready).with_reset(reset).with_nmi(nmi);
    link.write_at(REG_CPU, reg.into_bytes()[0])?;
    Ok(())
}

/// Read the DIP switches into `state`.
pub fn read_pet_model(link: &mut Link, state: &mut SystemState) -> Result<(), LinkError> {
    let status = StatusRegister::from_bytes([link.read_at(REG_STATUS)?]);

    state.pet_video_type = if status.crt_fixed() { PetVideoType::Fixed } else { PetVideoType::Crtc };
    state.pet_keyboard_model = if status.keyboard_graphics() {
        PetKeyboardModel::Graphics
    }
    else {
        PetKeyboardModel::Business
    };
    Ok(())
}

/// Push column count and video RAM mask to the video control register.
pub fn write_pet_model(link: &mut Link, state: &SystemState) -> Result<(), LinkError> {
    assert_eq!(state.video_ram_bytes(), (state.video_ram_mask() as usize + 1) * 1024);
    let reg = VideoControlRegister::new()
        .with_columns_80(state.display_columns() == DisplayColumns::Eighty)
        .with_ram_mask(state.video_ram_mask());
    link.write_at(REG_VIDEO, reg.into_bytes()[0])?;
    Ok(())
}

/// Exchange per-iteration state with the PLD: push the USB keyboard matrix,
/// pull the matrix the PET sees, the CRTC registers and the character set flag.
pub fn sync_state(
    link: &mut Link,
    state: &SystemState,
    usb_matrix: &[u8; KEY_COL_COUNT],
    pet_matrix: &mut [u8; KEY_COL_COUNT],
) -> Result<(), LinkError> {
    link.write(ADDR_KBD, usb_matrix)?;
    link.read(ADDR_KBD, pet_matrix)?;

    let mut crtc = [0u8; CRTC_REG_COUNT];
    link.read(ADDR_CRTC, &mut crtc)?;
    state.video.set_crtc_registers(&crtc);

    let status = StatusRegister::from_bytes([link.read_at(REG_STATUS)?]);
    state.video.set_graphics(status.graphics());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimTarget;

    fn setup() -> (Link, SimTarget, SystemState) {
        let sim = SimTarget::new();
        (Link::new(Box::new(sim.clone())), sim, SystemState::new())
    }

    #[test]
    fn cpu_control_bits() {
        let (mut link, sim, _) = setup();
        set_cpu(&mut link, true, false, false).unwrap();
        set_cpu(&mut link, false, true, false).unwrap();
        set_cpu(&mut link, false, false, true).unwrap();
        set_cpu(&mut link, true, true, true).unwrap();
        assert_eq!(sim.cpu_history(), vec![0b001, 0b010, 0b100, 0b111]);
    }

    #[test]
    fn dip_switches_select_model() {
        let (mut link, sim, mut state) = setup();

        sim.set_status(0b000);
        read_pet_model(&mut link, &mut state).unwrap();
        assert_eq!(state.pet_video_type, PetVideoType::Crtc);
        assert_eq!(state.pet_keyboard_model, PetKeyboardModel::Business);

        sim.set_status(0b110);
        read_pet_model(&mut link, &mut state).unwrap();
        assert_eq!(state.pet_video_type, PetVideoType::Fixed);
        assert_eq!(state.pet_keyboard_model, PetKeyboardModel::Graphics);
    }

    #[test]
    fn video_control_carries_columns_and_mask() {
        let (mut link, sim, mut state) = setup();
        write_pet_model(&mut link, &state).unwrap();
        state.set_display_columns(DisplayColumns::Eighty);
        state.set_video_ram_mask(3);
        write_pet_model(&mut link, &state).unwrap();
        state.set_display_columns(DisplayColumns::Forty);
        state.set_video_ram_mask(2);
        write_pet_model(&mut link, &state).unwrap();
        assert_eq!(sim.video_history(), vec![0b000, 0b111, 0b100]);
    }

    #[test]
    fn sync_exchanges_matrices_and_video_state() {
        let (mut link, sim, state) = setup();
        let crtc = [0x31, 0x50, 0x29, 0x0F, 0x28, 0x05, 0x19, 0x21, 0, 7, 0, 0, 0x10, 0];
        sim.poke_range(ADDR_CRTC, &crtc);
        sim.set_status(0b001);
        sim.set_physical_key(4, 1, true);

        let mut usb = [0xFF; KEY_COL_COUNT];
        usb[9] = 0xFE;
        let mut pet = [0u8; KEY_COL_COUNT];
        sync_state(&mut link, &state, &usb, &mut pet).unwrap();

        assert_eq!(sim.usb_matrix(), usb);
        assert_eq!(pet[9], 0xFE);
        assert_eq!(pet[1], 0xEF);
        assert_eq!(pet[0], 0xFF);
        assert_eq!(state.video.crtc_registers(), crtc);
        assert!(state.video.graphics());
    }
}
