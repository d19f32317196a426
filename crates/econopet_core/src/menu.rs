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

    core::menu.rs

    Boot menu. Lists the configurations in /config.yaml on the PET screen,
    lets the user pick one with the cursor keys and runs its setup actions.

*/

use econopet_common::keys::{KeyCode, KEY_CR, KEY_DOWN, KEY_LF, KEY_UP};

use crate::{
    config::{parse_config, parse_config_file, read_config_file, ConfigOptions, SetupSink, CONFIG_PATH},
    console::prompt,
    display::{term_end, window_begin, window_show},
    error::FwResult,
    firmware::Firmware,
    fs::FileSystem,
    hw::{MENU_COLUMNS, MENU_ROWS, VIDEO_CHAR_BUFFER_BYTE_SIZE, VIDEO_COLOR_OFFSET},
    pet::{pet_reset, MenuRomBoot},
    state::{PetKeyboardModel, PetVideoType, TermInputDest, TermMode, VideoSource},
    window::Window,
};

/// White on black.
pub const MENU_COLOR: u8 = 0x0F;

const MENU_TITLE: &str = "EconoPET";
const MENU_FIRST_ROW: usize = 2;

/// Collects configuration names without running any actions.
struct NameCollector {
    model: (PetKeyboardModel, PetVideoType),
    names: Vec<String>,
}

impl SetupSink for NameCollector {
    fn on_exit_config(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    fn pet_model(&self) -> (PetKeyboardModel, PetVideoType) {
        self.model
    }

    fn on_load(&mut self, _file: &str, _address: u32) -> FwResult<()> {
        Ok(())
    }

    fn on_patch(&mut self, _address: u32, _bytes: &[u8]) -> FwResult<()> {
        Ok(())
    }

    fn on_copy(&mut self, _source: u32, _destination: u32, _length: u32) -> FwResult<()> {
        Ok(())
    }

    fn on_set_options(&mut self, _options: &ConfigOptions) -> FwResult<()> {
        Ok(())
    }

    fn on_set_keymap(&mut self, _file: &str) -> FwResult<()> {
        Ok(())
    }

    fn on_fix_checksum(&mut self, _start: u32, _end: u32, _fix_addr: u32, _expected: u8) -> FwResult<()> {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MenuAction {
    None,
    Redraw,
    Select(usize),
}

#[derive(Debug, Default)]
pub struct ConfigMenu {
    names:    Vec<String>,
    selected: usize,
}

impl ConfigMenu {
    pub fn new(names: Vec<String>) -> Self {
        Self { names, selected: 0 }
    }

    /// Read the configuration names from `CONFIG_PATH`.
    pub fn enumerate(fs: &mut dyn FileSystem, model: (PetKeyboardModel, PetVideoType)) -> FwResult<Self> {
        let mut collector = NameCollector {
            model,
            names: Vec::new(),
        };
        parse_config_file(fs, CONFIG_PATH, &mut collector, None)?;
        Ok(Self::new(collector.names))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn handle_key(&mut self, key: KeyCode) -> MenuAction {
        match key {
            KEY_UP if self.selected > 0 => {
                self.selected -= 1;
                MenuAction::Redraw
            }
            KEY_DOWN if self.selected + 1 < self.names.len() => {
                self.selected += 1;
                MenuAction::Redraw
            }
            KEY_CR | KEY_LF if !self.names.is_empty() => MenuAction::Select(self.selected),
            _ => MenuAction::None,
        }
    }

    /// Draw the list with a reverse video bar on the selection. Entries that
    /// do not fit on screen are left off.
    pub fn draw(&self, window: &mut Window<'_>) {
        let title = window.xy((window.width() - MENU_TITLE.len()) / 2, 0);
        window.puts(title, MENU_TITLE);

        let rows = window.height() - MENU_FIRST_ROW;
        for (i, name) in self.names.iter().take(rows).enumerate() {
            let start = window.xy(1, MENU_FIRST_ROW + i);
            window.puts_n(start, name, window.width() - 2);
            if i == self.selected {
                let bar = window.xy(0, MENU_FIRST_ROW + i);
                window.reverse(bar, window.width());
            }
        }
    }
}

impl Firmware {
    /// Show the configuration menu and run the chosen configuration. When
    /// `select` is given the menu does not wait for a key.
    pub fn menu_enter(&mut self, select: Option<usize>) -> FwResult<()> {
        log::info!("-- Enter Menu --");
        self.state.video_source = VideoSource::Firmware;
        self.start_menu_rom(MenuRomBoot::Normal)?;
        self.state
            .video
            .fill(VIDEO_COLOR_OFFSET, VIDEO_CHAR_BUFFER_BYTE_SIZE - VIDEO_COLOR_OFFSET, MENU_COLOR);

        let model = (self.state.pet_keyboard_model, self.state.pet_video_type);
        match ConfigMenu::enumerate(&mut *self.fs, model) {
            Ok(mut menu) if !menu.is_empty() => {
                let choice = match select {
                    Some(index) => Some(index),
                    None => self.menu_select(&mut menu)?,
                };
                if let Some(index) = choice {
                    self.run_config(&menu, index)?;
                }
            }
            Ok(_) => log::warn!("{}: no configurations", CONFIG_PATH),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::error!("{}", e),
        }

        self.state.video_source = VideoSource::Pet;
        pet_reset(&mut self.link, &*self.io.clock)?;
        log::info!("-- Exit Menu --");
        Ok(())
    }

    /// Run the menu until a configuration is chosen.
    fn menu_select(&mut self, menu: &mut ConfigMenu) -> FwResult<Option<usize>> {
        let saved_mode = self.state.term_mode;
        self.state.term_mode = TermMode::Log;
        self.state.term_input_dest = TermInputDest::ToFirmware;

        let mut screen = [0u8; MENU_COLUMNS * MENU_ROWS];
        let mut redraw = true;
        let choice = loop {
            if redraw {
                let mut window = Window::new(&mut screen, MENU_COLUMNS, MENU_ROWS);
                window_begin(&mut *self.io.uart, &mut window);
                menu.draw(&mut window);
                window_show(&mut *self.io.uart, &window);
                self.state.video.store(0, window.as_bytes());
            }
            match self.wait_key() {
                Ok(key) => match menu.handle_key(key) {
                    MenuAction::Select(index) => break Ok(Some(index)),
                    action => redraw = action == MenuAction::Redraw,
                },
                Err(e) => break Err(e),
            }
        };

        self.state.term_mode = saved_mode;
        term_end(&mut *self.io.uart);
        prompt(&mut *self.io.uart);
        choice
    }

    fn run_config(&mut self, menu: &ConfigMenu, index: usize) -> FwResult<()> {
        let Some(name) = menu.names().get(index)
        else {
            log::warn!("no configuration #{} ({} available)", index, menu.names().len());
            return Ok(());
        };
        log::info!("Selected: {}", name);

        let data = read_config_file(&mut *self.fs, CONFIG_PATH)?;
        match parse_config(CONFIG_PATH, &data, &mut self.setup_actions(), Some(index)) {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::error!("{}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ConfigError,
        error::FirmwareError,
        firmware::tests::{board_with, CONFIG},
        fs::MemFs,
        hal::NoButton,
        hw::DVI_BIT_CLOCK_KHZ,
        state::DisplayColumns,
    };

    fn screen() -> Vec<u8> {
        vec![0u8; MENU_COLUMNS * MENU_ROWS]
    }

    #[test]
    fn keys_move_the_bar() {
        let mut menu = ConfigMenu::new(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(menu.handle_key(KEY_UP), MenuAction::None);
        assert_eq!(menu.handle_key(KEY_DOWN), MenuAction::Redraw);
        assert_eq!(menu.handle_key(KEY_DOWN), MenuAction::Redraw);
        assert_eq!(menu.handle_key(KEY_DOWN), MenuAction::None);
        assert_eq!(menu.selected(), 2);
        assert_eq!(menu.handle_key(b'x' as KeyCode), MenuAction::None);
        assert_eq!(menu.handle_key(KEY_CR), MenuAction::Select(2));
        assert_eq!(menu.handle_key(KEY_LF), MenuAction::Select(2));

        let mut empty = ConfigMenu::default();
        assert_eq!(empty.handle_key(KEY_CR), MenuAction::None);
    }

    #[test]
    fn draw_reverses_selected_row() {
        let mut menu = ConfigMenu::new(vec!["one".into(), "two".into()]);
        menu.handle_key(KEY_DOWN);
        let mut buf = screen();
        let mut window = Window::new(&mut buf, MENU_COLUMNS, MENU_ROWS);
        window.fill(0x20);
        menu.draw(&mut window);

        let row = |y: usize| &window.as_bytes()[y * MENU_COLUMNS..(y + 1) * MENU_COLUMNS];
        // 'o' is $0F in the video ROM.
        assert_eq!(row(MENU_FIRST_ROW)[1], 0x0F);
        assert!(row(MENU_FIRST_ROW).iter().all(|c| c & 0x80 == 0));
        assert!(row(MENU_FIRST_ROW + 1).iter().all(|c| c & 0x80 != 0));
        assert_eq!(row(MENU_FIRST_ROW + 1)[1], 0x14 | 0x80);
    }

    #[test]
    fn enumerate_lists_every_config() {
        let mut fs = MemFs::new();
        fs.insert(CONFIG_PATH, CONFIG);
        let menu = ConfigMenu::enumerate(&mut fs, (PetKeyboardModel::Business, PetVideoType::Crtc)).unwrap();
        assert_eq!(menu.names(), ["PET 4032", "PET 8032"]);
    }

    #[test]
    fn enumerate_without_config_file() {
        let mut fs = MemFs::new();
        let err = ConfigMenu::enumerate(&mut fs, (PetKeyboardModel::Business, PetVideoType::Crtc)).unwrap_err();
        assert!(matches!(err, FirmwareError::Config(ConfigError::Fs(_))));
        assert!(err.is_fatal());
    }

    #[test]
    fn menu_waits_for_selection() {
        let mut fs = MemFs::new();
        fs.insert(CONFIG_PATH, CONFIG);
        let (mut fw, board) = board_with(fs, Box::new(NoButton), DVI_BIT_CLOCK_KHZ);
        // Down arrow, then Enter.
        board.uart.lock().push_input(b"\x1b[B\r");
        fw.menu_enter(None).unwrap();

        assert_eq!(fw.state().display_columns(), DisplayColumns::Eighty);
        assert_eq!(fw.state().video_source, VideoSource::Pet);
        assert_eq!(fw.state().term_mode, TermMode::Cli);
        // The menu screen was mirrored to PET video RAM with the bar on row 3.
        assert_eq!(board.sim.peek(0x8000 + (MENU_FIRST_ROW as u32 + 1) * 40) & 0x80, 0x80);
        assert_eq!(board.sim.peek(0x8800), MENU_COLOR);
        let out = board.uart.lock().take_output();
        assert!(out.contains("PET 8032"));
    }

    #[test]
    fn missing_config_is_fatal() {
        let (mut fw, _board) = board_with(MemFs::new(), Box::new(NoButton), DVI_BIT_CLOCK_KHZ);
        let err = fw.menu_enter(None).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(fw.state().video_source, VideoSource::Firmware);
    }

    #[test]
    fn config_without_entries_restarts_pet() {
        let mut fs = MemFs::new();
        fs.insert(CONFIG_PATH, "configs: []\n");
        let (mut fw, board) = board_with(fs, Box::new(NoButton), DVI_BIT_CLOCK_KHZ);
        fw.menu_enter(None).unwrap();
        assert_eq!(fw.state().video_source, VideoSource::Pet);
        assert_eq!(board.sim.cpu_history().last(), Some(&0b001));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut fs = MemFs::new();
        fs.insert(CONFIG_PATH, CONFIG);
        let (mut fw, board) = board_with(fs, Box::new(NoButton), DVI_BIT_CLOCK_KHZ);
        fw.menu_enter(Some(7)).unwrap();
        assert_eq!(board.sim.peek_range(0x9000, 2), vec![0, 0]);
        assert_eq!(fw.state().video_source, VideoSource::Pet);
    }
}
