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

    core::video::serializer.rs

    Host stand-in for the HSTX serializer: drains valid scanlines, keeps
    the most recent one on screen, and returns buffers to the free queue.

*/

use crate::video::queue::{TmdsBuffer, TmdsPort};

pub struct SimSerializer {
    port: TmdsPort,
    current: Option<TmdsBuffer>,
    lines_sent: u64,
    starved: u64,
}

impl SimSerializer {
    pub fn new(port: TmdsPort) -> Self {
        Self {
            port,
            current: None,
            lines_sent: 0,
            starved: 0,
        }
    }

    /// Emit one scanline. When the renderer has nothing ready the previous
    /// line is repeated.
    pub fn scanline(&mut self) -> Option<&[u32]> {
        match self.port.try_recv() {
            Ok(next) => {
                if let Some(prev) = self.current.replace(next) {
                    // The renderer holds the other end; a closed channel just drops the buffer.
                    let _ = self.port.send(prev);
                }
            }
            Err(_) => {
                self.starved += 1;
            }
        }
        self.lines_sent += 1;
        self.current.as_deref()
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    pub fn starved(&self) -> u64 {
        self.starved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_last_line_when_starved() {
        let (renderer, serializer) = TmdsPort::new_pair(2);
        let mut ser = SimSerializer::new(serializer);
        assert!(ser.scanline().is_none());

        let mut buf = renderer.recv().unwrap();
        buf[0] = 0xABCD;
        renderer.send(buf).unwrap();

        assert_eq!(ser.scanline().unwrap()[0], 0xABCD);
        assert_eq!(ser.scanline().unwrap()[0], 0xABCD);
        assert_eq!(ser.starved(), 2);
        assert_eq!(ser.lines_sent(), 3);

        // The displayed buffer is returned once a newer one arrives.
        let buf = renderer.recv().unwrap();
        renderer.send(buf).unwrap();
        ser.scanline();
        assert!(renderer.try_recv().is_ok());
    }
}
