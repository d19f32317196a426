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

    core::video::queue.rs

    The TMDS buffer queues between the scanline renderer and the serializer.

    Each side holds one end of a channel pair: the renderer receives free
    buffers and sends valid ones; the serializer does the reverse.

*/

use crossbeam_channel;

use crate::hw::WORDS_PER_SCANLINE;

/// One encoded scanline, lane-major: blue, green, red.
pub type TmdsBuffer = Box<[u32]>;

pub fn new_tmds_buffer() -> TmdsBuffer {
    vec![0u32; WORDS_PER_SCANLINE].into_boxed_slice()
}

pub struct TmdsPort {
    sender:   crossbeam_channel::Sender<TmdsBuffer>,
    receiver: crossbeam_channel::Receiver<TmdsBuffer>,
}

impl TmdsPort {
    /// Create the (renderer, serializer) ports with `n_buffers` buffers
    /// waiting in the free queue.
    pub fn new_pair(n_buffers: usize) -> (TmdsPort, TmdsPort) {
        let (free_tx, free_rx) = crossbeam_channel::bounded(n_buffers);
        let (valid_tx, valid_rx) = crossbeam_channel::bounded(n_buffers);
        for _ in 0..n_buffers {
            // Cannot fail: the channel has room for every buffer.
            let _ = free_tx.send(new_tmds_buffer());
        }
        (
            TmdsPort {
                sender:   valid_tx,
                receiver: free_rx,
            },
            TmdsPort {
                sender:   free_tx,
                receiver: valid_rx,
            },
        )
    }

    pub fn send(&self, buf: TmdsBuffer) -> Result<(), crossbeam_channel::SendError<TmdsBuffer>> {
        self.sender.send(buf)
    }

    /// Blocking receive.
    pub fn recv(&self) -> Result<TmdsBuffer, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<TmdsBuffer, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<TmdsBuffer, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
