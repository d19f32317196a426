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

    headless::uart.rs

    stdin/stdout standing in for the MCU's UART. A reader thread feeds
    stdin bytes into a channel the firmware polls without blocking.

*/

use std::{
    io::{self, Read, Write},
    thread,
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use econopet_core::hal::Uart;

pub struct StdioUart {
    rx:  Receiver<u8>,
    out: io::Stdout,
}

impl StdioUart {
    /// Start the stdin reader thread.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("uart-rx".to_string())
            .spawn(move || read_stdin(io::stdin(), tx))?;
        Ok(Self { rx, out: io::stdout() })
    }
}

fn read_stdin(mut input: impl Read, tx: Sender<u8>) {
    let mut buf = [0u8; 64];
    loop {
        match input.read(&mut buf) {
            Ok(0) => {
                log::debug!("uart: stdin closed");
                return;
            }
            Ok(n) => {
                for byte in &buf[..n] {
                    if tx.send(*byte).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                log::warn!("uart: {}", e);
                return;
            }
        }
    }
}

impl Uart for StdioUart {
    fn read_byte(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            log::debug!("uart: {}", e);
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_forwards_every_byte() {
        let (tx, rx) = crossbeam_channel::unbounded();
        read_stdin(&b"reset\r"[..], tx);
        let bytes: Vec<u8> = rx.try_iter().collect();
        assert_eq!(bytes, b"reset\r");
    }

    #[test]
    fn reader_stops_when_firmware_is_gone() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        read_stdin(&b"abc"[..], tx);
    }
}
