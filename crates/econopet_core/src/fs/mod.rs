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

    core::fs::mod.rs

    Removable media facade. The FAT driver is reached through the
    FileSystem trait; paths are absolute, rooted at the card.

*/

use std::io::{self, Read};

use crate::{
    error::{ErrnoInfo, FsError},
    scratch::ScratchBuffer,
};

pub mod host;
pub mod mem;

pub use host::HostFs;
pub use mem::MemFs;

pub type FileReader = Box<dyn Read + Send>;

pub trait FileSystem: Send {
    /// Open `path` for reading. `path` is already known to be absolute.
    fn open(&mut self, path: &str) -> io::Result<FileReader>;
}

pub(crate) fn errno_of(err: &io::Error) -> Option<ErrnoInfo> {
    Some(ErrnoInfo {
        code: err.raw_os_error().unwrap_or(0),
        description: err.to_string(),
    })
}

/// Open a file on the card. Relative paths are rejected.
pub fn sd_open(fs: &mut dyn FileSystem, path: &str) -> Result<FileReader, FsError> {
    if !path.starts_with('/') {
        return Err(FsError::NotAbsolute(path.to_string()));
    }
    fs.open(path).map_err(|e| FsError::Open {
        path: path.to_string(),
        errno: errno_of(&e),
    })
}

/// Read until `dst` is full or the file ends. Returns the byte count.
pub fn sd_read(path: &str, file: &mut dyn Read, dst: &mut [u8]) -> Result<usize, FsError> {
    let mut total = 0;
    while total < dst.len() {
        match file.read(&mut dst[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(FsError::Read {
                    path: path.to_string(),
                    errno: errno_of(&e),
                })
            }
        }
    }
    Ok(total)
}

/// Stream up to `max_size` bytes of a file through the scratch buffer,
/// handing each page and its file offset to `callback`. Returns the number
/// of bytes delivered.
pub fn sd_read_file<E, F>(
    fs: &mut dyn FileSystem,
    scratch: &mut ScratchBuffer,
    path: &str,
    max_size: usize,
    mut callback: F,
) -> Result<usize, E>
where
    E: From<FsError>,
    F: FnMut(usize, &[u8]) -> Result<(), E>,
{
    let mut file = sd_open(fs, path)?;
    let mut buf = scratch.acquire("sd_read_file");

    let mut offset = 0;
    while offset < max_size {
        let want = (max_size - offset).min(buf.len());
        let n = sd_read(path, &mut file, &mut buf[..want])?;
        if n == 0 {
            break;
        }
        callback(offset, &buf[..n])?;
        offset += n;
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::SCRATCH_BUFFER_SIZE;

    #[test]
    fn relative_paths_are_rejected() {
        let mut fs = MemFs::new();
        fs.insert("/config.yaml", b"configs: []".to_vec());
        assert!(matches!(sd_open(&mut fs, "config.yaml"), Err(FsError::NotAbsolute(_))));
        assert!(sd_open(&mut fs, "/config.yaml").is_ok());
    }

    #[test]
    fn missing_file_reports_errno() {
        let mut fs = MemFs::new();
        let err = sd_open(&mut fs, "/nope.bin").err().unwrap();
        assert_eq!(err.to_string(), "unable to open '/nope.bin'");
        assert!(err.errno().is_some());
    }

    #[test]
    fn read_file_pages_through_scratch() {
        let mut fs = MemFs::new();
        let data: Vec<u8> = (0..SCRATCH_BUFFER_SIZE * 2 + 100).map(|i| i as u8).collect();
        fs.insert("/roms/big.bin", data.clone());
        let mut scratch = ScratchBuffer::new();

        let mut pages = Vec::new();
        let mut copy = Vec::new();
        let total = sd_read_file::<FsError, _>(&mut fs, &mut scratch, "/roms/big.bin", usize::MAX, |offset, page| {
            pages.push((offset, page.len()));
            copy.extend_from_slice(page);
            Ok(())
        })
        .unwrap();

        assert_eq!(total, data.len());
        assert_eq!(copy, data);
        assert_eq!(
            pages,
            vec![
                (0, SCRATCH_BUFFER_SIZE),
                (SCRATCH_BUFFER_SIZE, SCRATCH_BUFFER_SIZE),
                (SCRATCH_BUFFER_SIZE * 2, 100)
            ]
        );
        assert_eq!(scratch.owner(), None);
    }

    #[test]
    fn read_file_honours_max_size() {
        let mut fs = MemFs::new();
        fs.insert("/a.bin", vec![7u8; 64]);
        let mut scratch = ScratchBuffer::new();
        let mut seen = 0;
        let total = sd_read_file::<FsError, _>(&mut fs, &mut scratch, "/a.bin", 10, |_, page| {
            seen += page.len();
            Ok(())
        })
        .unwrap();
        assert_eq!((total, seen), (10, 10));
    }
}
