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

    core::scratch.rs

    The shared scratch buffer.

    One fixed-size buffer is lent to whichever operation needs bulk temporary
    storage (file paging, link copies, keymap loads). The lease is returned
    when the guard drops.

*/

use std::ops::{Deref, DerefMut};

use crate::hw::SCRATCH_BUFFER_SIZE;

pub struct ScratchBuffer {
    buf:   Box<[u8]>,
    owner: Option<&'static str>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self {
            buf:   vec![0u8; SCRATCH_BUFFER_SIZE].into_boxed_slice(),
            owner: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    /// Lease the buffer to `owner`. Acquiring a buffer whose previous lease
    /// was never returned is a programming error.
    pub fn acquire(&mut self, owner: &'static str) -> ScratchGuard<'_> {
        assert!(
            self.owner.is_none(),
            "scratch buffer acquired by '{}' while still held by '{}'",
            owner,
            self.owner.unwrap_or_default()
        );
        self.owner = Some(owner);
        ScratchGuard { scratch: self, owner }
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScratchGuard<'a> {
    scratch: &'a mut ScratchBuffer,
    owner:   &'static str,
}

impl Deref for ScratchGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.scratch.buf
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.scratch.buf
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        assert_eq!(self.scratch.owner, Some(self.owner), "scratch buffer released by non-owner");
        self.scratch.owner = None;
    }
}
