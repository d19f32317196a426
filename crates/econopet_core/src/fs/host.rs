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

    core::fs::host.rs

    A host directory standing in for the SD card.

*/

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use super::{FileReader, FileSystem};

pub struct HostFs {
    base_path: PathBuf,
}

impl HostFs {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a card path onto the host directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.base_path.clone();
        for part in path.split('/').filter(|p| !p.is_empty() && *p != "." && *p != "..") {
            resolved.push(part);
        }
        resolved
    }
}

impl FileSystem for HostFs {
    fn open(&mut self, path: &str) -> io::Result<FileReader> {
        let resolved = self.resolve(path);
        log::debug!("HostFs: opening {}", resolved.display());
        Ok(Box::new(File::open(resolved)?))
    }
}
