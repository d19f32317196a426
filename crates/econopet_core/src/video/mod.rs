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

    core::video::mod.rs

    DVI video output: TMDS encoding, the scanline renderer and its
    serializer queues.

*/

pub mod queue;
pub mod renderer;
pub mod serializer;
pub mod tmds;

use std::{
    sync::{atomic::AtomicBool, Arc},
    thread::JoinHandle,
};

use thiserror::Error;

pub use queue::{TmdsBuffer, TmdsPort};
pub use renderer::ScanlineRenderer;
pub use serializer::SimSerializer;

use crate::{
    error::FirmwareError,
    hal::ClockSource,
    hw::{DVI_BIT_CLOCK_KHZ, DVI_CLOCK_TOLERANCE_KHZ, DVI_N_TMDS_BUFFERS},
    state::SharedVideo,
};

#[derive(Debug, Error, PartialEq)]
pub enum VideoError {
    #[error("TMDS buffer queue disconnected")]
    Disconnected,
}

/// The DVI bit clock is derived from clk_sys and must be exact.
pub fn check_dvi_clock(clocks: &dyn ClockSource) -> Result<(), FirmwareError> {
    let actual = clocks.clk_sys_khz();
    if actual.abs_diff(DVI_BIT_CLOCK_KHZ) > DVI_CLOCK_TOLERANCE_KHZ {
        return Err(FirmwareError::ClockMismatch {
            expected: DVI_BIT_CLOCK_KHZ,
            actual,
            tolerance: DVI_CLOCK_TOLERANCE_KHZ,
        });
    }
    Ok(())
}

pub struct VideoOutput {
    pub serializer: SimSerializer,
    pub stop: Arc<AtomicBool>,
    pub renderer: JoinHandle<Result<(), VideoError>>,
}

/// Verify the clock, set up the buffer queues, prime the first scanline and
/// start the renderer on its own thread.
pub fn video_init(
    clocks: &dyn ClockSource,
    video: Arc<SharedVideo>,
    font: Arc<[u8]>,
) -> Result<VideoOutput, FirmwareError> {
    check_dvi_clock(clocks)?;

    let (renderer_port, serializer_port) = TmdsPort::new_pair(DVI_N_TMDS_BUFFERS);
    let mut renderer = ScanlineRenderer::new(video, font, renderer_port)?;
    renderer.prepare_scanline(0)?;

    let (start_tx, start_rx) = crossbeam_channel::bounded(1);
    let stop = Arc::new(AtomicBool::new(false));
    let renderer_stop = stop.clone();
    let handle = std::thread::spawn(move || renderer.run(start_rx, renderer_stop));

    // The renderer may only have exited if the queues are gone.
    let _ = start_tx.send(());
    log::info!("DVI output started at {} kHz", clocks.clk_sys_khz());

    Ok(VideoOutput {
        serializer: SimSerializer::new(serializer_port),
        stop,
        renderer: handle,
    })
}
