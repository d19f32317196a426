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

    headless::main.rs

    Entry point for the hosted EconoPET runner.

*/

use std::sync::Arc;

use econopet_core::hal::{Clock, SystemClock};
use econopet_headless::config::{read_config_file, DEFAULT_CONFIG_PATH};

fn main() -> Result<(), anyhow::Error> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let log = econopet_headless::init_logging(clock.clone())?;

    let config = read_config_file(DEFAULT_CONFIG_PATH)?;
    log::debug!("config: {:?}", config);

    econopet_headless::run(config, clock, log)
}
