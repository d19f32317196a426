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

    core::checksum.rs

    8-bit end-around-carry checksums, as used by the PET ROM self tests.

*/

use crate::{error::LinkError, link::Link, scratch::ScratchBuffer};

/// Fold `buffer` into `sum`. Carries out of bit 7 are added back into bit 0.
pub fn checksum_add(buffer: &[u8], sum: u8) -> u8 {
    let mut a = sum as u32;
    for byte in buffer {
        a += *byte as u32;
        a += a >> 8;
        a &= 0xFF;
    }
    a as u8
}

/// The replacement for `current` that moves the sum from `actual` to `expected`.
///
/// The end-around carry makes the sum ones' complement, so the correction is
/// taken mod 255. Zero and 0xFF are the same residue; 0xFF is used unless the
/// target itself is zero.
pub fn checksum_fix(current: u8, actual: u8, expected: u8) -> u8 {
    if actual == expected {
        return current;
    }
    let delta = (expected as u32 + 255 - actual as u32) % 255;
    let fixed = ((current as u32 + delta) % 255) as u8;
    if fixed == 0 && expected != 0 {
        0xFF
    }
    else {
        fixed
    }
}

/// Checksum the PLD memory in `start..end` (`end` exclusive), reading through
/// the scratch buffer.
pub fn checksum_ram(link: &mut Link, scratch: &mut ScratchBuffer, start: u32, end: u32) -> Result<u8, LinkError> {
    let mut buf = scratch.acquire("checksum_ram");
    let mut sum = 0;
    let mut addr = start;
    while addr < end {
        let n = ((end - addr) as usize).min(buf.len());
        link.read(addr, &mut buf[..n])?;
        sum = checksum_add(&buf[..n], sum);
        addr += n as u32;
    }
    Ok(sum)
}
