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

    core::actions.rs

    The production setup sink: carries out configuration actions against
    PLD memory, the SD card and the system state.

*/

use crate::{
    checksum::{checksum_add, checksum_fix, checksum_ram},
    config::{ConfigOptions, SetupSink},
    error::{FirmwareError, FsError, FwResult},
    fs::{sd_read_file, FileSystem},
    link::Link,
    registers::write_pet_model,
    scratch::ScratchBuffer,
    state::{PetKeyboardModel, PetVideoType, SystemState, UsbKeymaps, USB_KEYMAP_IMAGE_SIZE},
};

/// Directory holding ROM images named by relative `load` paths.
pub const ROM_DIR: &str = "/roms";

/// Resolve a `load` file name against [`ROM_DIR`].
pub fn rom_path(file: &str) -> String {
    if file.starts_with('/') {
        file.to_string()
    }
    else {
        format!("{}/{}", ROM_DIR, file)
    }
}

/// Load a binary USB keymap image into `keymaps`.
pub fn read_keymap(
    fs: &mut dyn FileSystem,
    scratch: &mut ScratchBuffer,
    path: &str,
    keymaps: &mut UsbKeymaps,
) -> Result<(), FsError> {
    let size = sd_read_file(fs, scratch, path, USB_KEYMAP_IMAGE_SIZE, |offset, page| {
        keymaps.write_image(offset, page);
        Ok::<(), FsError>(())
    })?;
    if size < USB_KEYMAP_IMAGE_SIZE {
        log::warn!("USB keymap '{}' is short ({} of {} bytes)", path, size, USB_KEYMAP_IMAGE_SIZE);
    }
    log::debug!("USB keymap: '{}'", path);
    Ok(())
}

pub struct SetupActions<'a> {
    pub link:    &'a mut Link,
    pub fs:      &'a mut dyn FileSystem,
    pub scratch: &'a mut ScratchBuffer,
    pub state:   &'a mut SystemState,
}

impl SetupSink for SetupActions<'_> {
    fn pet_model(&self) -> (PetKeyboardModel, PetVideoType) {
        (self.state.pet_keyboard_model, self.state.pet_video_type)
    }

    fn on_load(&mut self, file: &str, address: u32) -> FwResult<()> {
        let path = rom_path(file);
        log::debug!("${:04X}", address);

        let link = &mut *self.link;
        let mut sum = 0;
        let size = sd_read_file(&mut *self.fs, &mut *self.scratch, &path, usize::MAX, |offset, page| {
            sum = checksum_add(page, sum);
            link.write(address + offset as u32, page)?;
            Ok::<(), FirmwareError>(())
        })?;

        let end = (address + size as u32).wrapping_sub(1);
        log::debug!("-${:04X}: {} (${:02X})", end, file, sum);
        Ok(())
    }

    fn on_patch(&mut self, address: u32, bytes: &[u8]) -> FwResult<()> {
        log::debug!("${:04X}: patching {} bytes", address, bytes.len());
        self.link.write(address, bytes)?;
        Ok(())
    }

    fn on_copy(&mut self, source: u32, destination: u32, length: u32) -> FwResult<()> {
        log::debug!("${:04X}: copying {} bytes to ${:04X}", source, length, destination);
        let mut buf = self.scratch.acquire("copy");
        let chunk_max = buf.len() as u32;

        // Walk from the end when the ranges could overlap the wrong way.
        if destination > source {
            let mut remaining = length;
            while remaining > 0 {
                let n = remaining.min(chunk_max);
                let offset = remaining - n;
                self.link.read(source + offset, &mut buf[..n as usize])?;
                self.link.write(destination + offset, &buf[..n as usize])?;
                remaining -= n;
            }
        }
        else {
            let mut offset = 0;
            while offset < length {
                let n = (length - offset).min(chunk_max);
                self.link.read(source + offset, &mut buf[..n as usize])?;
                self.link.write(destination + offset, &buf[..n as usize])?;
                offset += n;
            }
        }
        Ok(())
    }

    fn on_set_options(&mut self, options: &ConfigOptions) -> FwResult<()> {
        self.state.set_display_columns(options.columns);
        self.state.set_video_ram_mask(options.video_ram_mask);
        if let Some(keymap) = &options.usb_keymap {
            self.on_set_keymap(keymap)?;
        }
        write_pet_model(self.link, self.state)?;

        log::debug!(
            "Set options: {} columns, video RAM mask {}",
            options.columns,
            options.video_ram_mask
        );
        Ok(())
    }

    fn on_set_keymap(&mut self, file: &str) -> FwResult<()> {
        read_keymap(&mut *self.fs, &mut *self.scratch, file, &mut self.state.keymaps)?;
        Ok(())
    }

    fn on_fix_checksum(&mut self, start: u32, end: u32, fix_addr: u32, expected: u8) -> FwResult<()> {
        let actual = checksum_ram(self.link, self.scratch, start, end + 1)?;
        if actual == expected {
            return Ok(());
        }

        let current = self.link.read_at(fix_addr)?;
        log::debug!(
            "${:04X}: fixing checksum for ${:04X}-{:04X} (${:02X} -> ${:02X})",
            fix_addr,
            start,
            end,
            actual,
            expected
        );
        self.link.write_at(fix_addr, checksum_fix(current, actual, expected))?;

        let verified = checksum_ram(self.link, self.scratch, start, end + 1)?;
        if verified != expected {
            return Err(FirmwareError::ChecksumVerify {
                start,
                end,
                expected,
                actual: verified,
            });
        }
        Ok(())
    }
}
