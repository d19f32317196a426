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

    core::video::renderer.rs

    Scanline renderer. Runs on the second core, turning the character
    buffer into TMDS scanlines in step with the serializer.

*/

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crossbeam_channel::Receiver;

use crate::{
    crtc::{DisplayGeometry, FrameParams},
    hw::{FONT_GRAPHICS_OFFSET, FONT_HEIGHT, FONT_WIDTH, FRAME_HEIGHT, FRAME_WIDTH, N_TMDS_LANES, WORDS_PER_LANE},
    state::{DisplayColumns, SharedVideo, CRTC_DEFAULT_REGISTERS},
    video::{
        queue::{TmdsBuffer, TmdsPort},
        tmds::{encode_font_16px_lane, encode_font_8px_lane, PaletteTable},
        VideoError,
    },
};

const MAX_CHARS_PER_LINE: usize = FRAME_WIDTH / FONT_WIDTH;

pub struct ScanlineRenderer {
    video:   Arc<SharedVideo>,
    font:    Arc<[u8]>,
    palette: PaletteTable,
    frame:   FrameParams,
    port:    TmdsPort,

    geo: DisplayGeometry,
    font_offset: usize,
    /// Permanently held pre-encoded blank scanline.
    blank: TmdsBuffer,

    chars:  [u8; MAX_CHARS_PER_LINE],
    colors: [u8; MAX_CHARS_PER_LINE],
}

impl ScanlineRenderer {
    /// Take one buffer from the free queue as the blank template and encode it.
    pub fn new(video: Arc<SharedVideo>, font: Arc<[u8]>, port: TmdsPort) -> Result<Self, VideoError> {
        let mut blank = port.recv().map_err(|_| VideoError::Disconnected)?;
        let palette = PaletteTable::default();

        // Background only: font height as the scanline index, black on black.
        let chars = [0u8; MAX_CHARS_PER_LINE];
        let colors = [0u8; MAX_CHARS_PER_LINE];
        for lane in 0..N_TMDS_LANES {
            encode_font_8px_lane(
                &chars,
                &colors,
                &mut blank[lane * WORDS_PER_LANE..(lane + 1) * WORDS_PER_LANE],
                &font,
                FONT_HEIGHT,
                lane,
                0x00,
                &palette,
            );
        }

        let frame = FrameParams::default();
        Ok(Self {
            geo: DisplayGeometry::calculate(&CRTC_DEFAULT_REGISTERS, DisplayColumns::Forty, &frame),
            video,
            font,
            palette,
            frame,
            port,
            font_offset: 0,
            blank,
            chars,
            colors,
        })
    }

    pub fn geometry(&self) -> &DisplayGeometry {
        &self.geo
    }

    pub fn blank(&self) -> &[u32] {
        &self.blank
    }

    fn reload_geometry(&mut self) {
        let columns = if self.video.columns_80() { DisplayColumns::Eighty } else { DisplayColumns::Forty };
        self.geo = DisplayGeometry::calculate(&self.video.crtc_registers(), columns, &self.frame);
        self.font_offset = if self.video.graphics() { FONT_GRAPHICS_OFFSET } else { 0 };
    }

    fn copy_blank_margins(&self, buf: &mut [u32]) {
        let left = self.geo.left_margin_words;
        let right_start = WORDS_PER_LANE - self.geo.right_margin_words;
        for lane in 0..N_TMDS_LANES {
            let base = lane * WORDS_PER_LANE;
            buf[base..base + left].copy_from_slice(&self.blank[base..base + left]);
            buf[base + right_start..base + WORDS_PER_LANE]
                .copy_from_slice(&self.blank[base + right_start..base + WORDS_PER_LANE]);
        }
    }

    /// Encode `n` characters starting at `src` into every lane at word offset `dst`.
    fn encode_span(&mut self, buf: &mut [u32], src: usize, n: usize, dst: usize, ra: usize) {
        for i in 0..n {
            self.chars[i] = self.video.char_at(src + i);
            self.colors[i] = self.video.color_at(src + i);
        }
        let font = &self.font[self.font_offset.min(self.font.len())..];
        for lane in 0..N_TMDS_LANES {
            let out = &mut buf[lane * WORDS_PER_LANE + dst..(lane + 1) * WORDS_PER_LANE];
            if self.geo.double_width {
                encode_font_16px_lane(
                    &self.chars[..n],
                    &self.colors[..n],
                    out,
                    font,
                    ra,
                    lane,
                    self.geo.invert_mask,
                    &self.palette,
                );
            }
            else {
                encode_font_8px_lane(
                    &self.chars[..n],
                    &self.colors[..n],
                    out,
                    font,
                    ra,
                    lane,
                    self.geo.invert_mask,
                    &self.palette,
                );
            }
        }
    }

    /// Render frame line `y` into a free buffer and queue it for the serializer.
    pub fn prepare_scanline(&mut self, y: usize) -> Result<(), VideoError> {
        let mut buf = self.port.recv().map_err(|_| VideoError::Disconnected)?;

        // y == 0 is the first visible scanline; the top margin wraps high.
        let y = y.wrapping_sub(self.geo.top_margin);

        if y >= self.geo.visible_scanlines {
            self.reload_geometry();
            buf.copy_from_slice(&self.blank);
        }
        else {
            let geo = self.geo;
            let row_start = (geo.vram_start + y / geo.scanlines_per_row * geo.chars_per_row) & geo.vram_mask;
            let ra = y % geo.scanlines_per_row;

            self.copy_blank_margins(&mut buf);

            let first_chars = (geo.vram_mask + 1 - row_start).min(geo.chars_per_row);
            self.encode_span(&mut buf, row_start, first_chars, geo.left_margin_words, ra);

            if first_chars < geo.chars_per_row {
                let mut first_words = first_chars * FONT_WIDTH / self.frame.symbols_per_word;
                if geo.double_width {
                    first_words *= 2;
                }
                self.encode_span(
                    &mut buf,
                    0,
                    geo.chars_per_row - first_chars,
                    geo.left_margin_words + first_words,
                    ra,
                );
            }
        }

        self.port.send(buf).map_err(|_| VideoError::Disconnected)
    }

    pub fn render_frame(&mut self) -> Result<(), VideoError> {
        for y in 0..FRAME_HEIGHT {
            self.prepare_scanline(y)?;
        }
        Ok(())
    }

    /// The core 1 loop: wait for the start signal, then render frames until
    /// `stop` is raised or the serializer goes away. Frame line 0 is expected
    /// to have been primed before the start signal.
    pub fn run(&mut self, start: Receiver<()>, stop: Arc<AtomicBool>) -> Result<(), VideoError> {
        start.recv().map_err(|_| VideoError::Disconnected)?;
        log::debug!("scanline renderer started");

        let mut y = 1;
        while !stop.load(Ordering::Relaxed) {
            self.prepare_scanline(y)?;
            y = (y + 1) % FRAME_HEIGHT;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hw::{FONT_ROM_SIZE, VIDEO_COLOR_OFFSET},
        state::{CRTC_R12_START_ADDR_HI, CRTC_R13_START_ADDR_LO},
        video::tmds::TMDS_TABLE,
    };

    fn test_font() -> Arc<[u8]> {
        let mut font = vec![0u8; FONT_ROM_SIZE];
        // Text set: char 1 is a solid block. Graphics set: char 1 is a left bar.
        for ra in 0..8 {
            font[8 + ra] = 0xFF;
            font[FONT_GRAPHICS_OFFSET + 8 + ra] = 0x80;
        }
        font.into()
    }

    fn renderer(n_buffers: usize) -> (ScanlineRenderer, TmdsPort, Arc<SharedVideo>) {
        let video = Arc::new(SharedVideo::new());
        let (renderer_port, serializer_port) = TmdsPort::new_pair(n_buffers);
        let r = ScanlineRenderer::new(video.clone(), test_font(), renderer_port).unwrap();
        (r, serializer_port, video)
    }

    /// Render one frame, returning every scanline in order.
    fn capture_frame(r: &mut ScanlineRenderer, serializer: &TmdsPort) -> Vec<TmdsBuffer> {
        let mut lines = Vec::new();
        for y in 0..FRAME_HEIGHT {
            r.prepare_scanline(y).unwrap();
            let buf = serializer.recv().unwrap();
            lines.push(buf.clone());
            serializer.send(buf).unwrap();
        }
        lines
    }

    #[test]
    fn blank_template_is_black() {
        let (r, _s, _v) = renderer(2);
        let black = TMDS_TABLE[0];
        assert!(r.blank().iter().all(|w| *w == black));
    }

    #[test]
    fn every_line_is_queued_once_per_frame() {
        let (mut r, serializer, _v) = renderer(3);
        let lines = capture_frame(&mut r, &serializer);
        assert_eq!(lines.len(), FRAME_HEIGHT);
        assert!(serializer.try_recv().is_err());
    }

    #[test]
    fn visible_rows_render_glyphs_between_blank_margins() {
        let (mut r, serializer, video) = renderer(2);
        // Row 0, column 0: white solid block.
        video.store(0, &[0x01]);
        video.store(VIDEO_COLOR_OFFSET, &[0x0F]);

        // First frame loads the geometry on the top margin.
        let lines = capture_frame(&mut r, &serializer);
        let geo = *r.geometry();
        assert_eq!(geo.top_margin, 20);

        let top = &lines[0];
        assert_eq!(&top[..], r.blank());

        let first_row = &lines[geo.top_margin];
        let lit = TMDS_TABLE[((0b0011 << 4) | 0xF) * 2];
        for lane in 0..N_TMDS_LANES {
            let base = lane * WORDS_PER_LANE;
            let left = geo.left_margin_words;
            assert_eq!(&first_row[base..base + left], &r.blank()[base..base + left]);
            // 16 pixel cell: 8 words all lit.
            assert!(first_row[base + left..base + left + 8].iter().all(|w| *w == lit));
            // The next cell is a black '@'.
            assert_eq!(first_row[base + left + 8], TMDS_TABLE[0]);
            let right = WORDS_PER_LANE - geo.right_margin_words;
            assert_eq!(&first_row[base + right..base + WORDS_PER_LANE], &r.blank()[base + right..base + WORDS_PER_LANE]);
        }

        // Below the visible area is blank again.
        assert_eq!(&lines[geo.top_margin + geo.visible_scanlines][..], r.blank());
    }

    #[test]
    fn graphics_flag_selects_upper_font() {
        let (mut r, serializer, video) = renderer(2);
        video.store(0, &[0x01]);
        video.store(VIDEO_COLOR_OFFSET, &[0x0F]);
        video.set_graphics(true);

        let lines = capture_frame(&mut r, &serializer);
        let row = &lines[r.geometry().top_margin];
        let left = r.geometry().left_margin_words;
        let lit_then_dark = TMDS_TABLE[((0b0011 << 4) | 0b1100) * 2];
        // The bar covers one source pixel, two output pixels.
        assert_eq!(row[left], lit_then_dark);
    }

    #[test]
    fn rows_wrap_at_the_video_ram_boundary() {
        let (mut r, serializer, video) = renderer(2);
        let mut crtc = CRTC_DEFAULT_REGISTERS;
        // Start 20 characters before the end of the 1 KB window.
        crtc[CRTC_R12_START_ADDR_HI] = 0x13;
        crtc[CRTC_R13_START_ADDR_LO] = 0xEC;
        video.set_crtc_registers(&crtc);
        // Last cell before the wrap, and the first cell after it.
        video.store(0x3FF, &[0x01]);
        video.store(0x000, &[0x01]);
        video.fill(VIDEO_COLOR_OFFSET, 0x400, 0x0F);

        let lines = capture_frame(&mut r, &serializer);
        let geo = *r.geometry();
        assert_eq!(geo.vram_start, 0x3EC);

        let row = &lines[geo.top_margin];
        let lit = TMDS_TABLE[((0b0011 << 4) | 0xF) * 2];
        let cell = |i: usize| &row[geo.left_margin_words + i * 8..geo.left_margin_words + (i + 1) * 8];
        assert!(cell(19).iter().all(|w| *w == lit));
        assert!(cell(20).iter().all(|w| *w == lit));
        assert!(cell(18).iter().all(|w| *w == TMDS_TABLE[0]));
        assert!(cell(21).iter().all(|w| *w == TMDS_TABLE[0]));
    }

    #[test]
    fn inverted_video_lights_empty_cells() {
        let (mut r, serializer, video) = renderer(2);
        let mut crtc = CRTC_DEFAULT_REGISTERS;
        crtc[CRTC_R12_START_ADDR_HI] = 0x00;
        video.set_crtc_registers(&crtc);
        video.fill(VIDEO_COLOR_OFFSET, 0x400, 0x0F);

        let lines = capture_frame(&mut r, &serializer);
        let geo = *r.geometry();
        assert_eq!(geo.invert_mask, 0xFF);
        let lit = TMDS_TABLE[((0b0011 << 4) | 0xF) * 2];
        assert_eq!(lines[geo.top_margin][geo.left_margin_words], lit);
    }

    #[test]
    fn run_stops_when_serializer_disconnects() {
        let (mut r, serializer, _v) = renderer(2);
        let (start_tx, start_rx) = crossbeam_channel::bounded(1);
        start_tx.send(()).unwrap();
        drop(serializer);
        let stop = Arc::new(AtomicBool::new(false));
        assert_eq!(r.run(start_rx, stop), Err(VideoError::Disconnected));
    }
}
