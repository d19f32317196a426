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

    headless::lib.rs

    Hosted runner for the EconoPET firmware. Wires the firmware core to a
    simulated PLD, a host directory for the SD card and stdio for the UART.

*/

#![forbid(unsafe_code)]

pub mod config;
pub mod uart;

use std::{
    sync::{atomic::Ordering, Arc, Mutex},
    thread,
};

use anyhow::{bail, Context};

use econopet_core::{
    fs::HostFs,
    hal::{Clock, FixedClockSource, NoButton, NoUsbHost, Watchdog},
    link::{Link, SimTarget},
    log::{LogBuffer, RingLogger, SharedLog},
    memtest::{test_ram, OnFailure, BRAM, SRAM},
    pet::Roms,
    scratch::ScratchBuffer,
    video::{video_init, SimSerializer},
    Firmware,
    Peripherals,
};

use crate::{config::HeadlessConfig, uart::StdioUart};

/// Stands in for the MCU watchdog: a reboot ends the process.
pub struct ExitWatchdog;

impl Watchdog for ExitWatchdog {
    fn reboot(&mut self) {
        log::warn!("Watchdog reboot requested, exiting.");
        log::logger().flush();
        std::process::exit(0);
    }
}

/// Install the ring logger, forwarding to `env_logger` so `RUST_LOG` still
/// controls what reaches the host console.
pub fn init_logging(clock: Arc<dyn Clock>) -> Result<SharedLog, anyhow::Error> {
    let log: SharedLog = Arc::new(Mutex::new(LogBuffer::new(clock)));
    let delegate = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    RingLogger::new(log.clone())
        .with_delegate(Box::new(delegate))
        .init()
        .context("installing logger")?;
    Ok(log)
}

/// Run the memory test over a link of its own before the firmware starts.
fn run_memtest(sim: &SimTarget, mode: OnFailure) -> Result<(), anyhow::Error> {
    let mut link = Link::new(Box::new(sim.clone()));
    let mut scratch = ScratchBuffer::new();
    let report = test_ram(&mut link, &mut scratch, &[SRAM, BRAM], mode)?;
    if report.passed() {
        log::info!("RAM test passed");
    }
    else {
        log::warn!("RAM test: {} failures", report.failures.len());
    }
    Ok(())
}

/// Drain scanlines the way the serializer DMA would until told to stop.
fn spawn_serializer(
    mut serializer: SimSerializer,
    stop: Arc<std::sync::atomic::AtomicBool>,
) -> Result<thread::JoinHandle<u64>, anyhow::Error> {
    let handle = thread::Builder::new()
        .name("serializer".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                serializer.scanline();
                thread::yield_now();
            }
            serializer.lines_sent()
        })
        .context("starting serializer thread")?;
    Ok(handle)
}

pub fn run(config: HeadlessConfig, clock: Arc<dyn Clock>, log: SharedLog) -> Result<(), anyhow::Error> {
    if !config.board.sd_root.is_dir() {
        bail!("SD card directory {} does not exist", config.board.sd_root.display());
    }
    log::info!("SD card: {}", config.board.sd_root.display());

    let sim = SimTarget::new();
    sim.set_status(config.board.status);

    if let Some(mode) = config.runner.memtest.on_failure() {
        run_memtest(&sim, mode)?;
    }

    let mut fs = HostFs::new(&config.board.sd_root);
    let roms = Roms::load(&mut fs, &mut ScratchBuffer::new());

    let io = Peripherals {
        uart:     Box::new(StdioUart::spawn().context("starting UART reader")?),
        clock:    clock.clone(),
        usb:      Box::new(NoUsbHost),
        button:   Box::new(NoButton),
        watchdog: Box::new(ExitWatchdog),
        clocks:   Box::new(FixedClockSource(config.board.clk_sys_khz)),
    };
    let mut firmware = Firmware::new(Link::new(Box::new(sim)), Box::new(fs), io, log, roms);

    let video = if config.runner.renderer {
        let clocks = FixedClockSource(config.board.clk_sys_khz);
        match video_init(&clocks, firmware.video(), firmware.roms().chars.clone()) {
            Ok(out) => {
                let serializer = spawn_serializer(out.serializer, out.stop.clone())?;
                Some((out.stop, out.renderer, serializer))
            }
            Err(e) => {
                firmware.handle_error(e);
                None
            }
        }
    }
    else {
        None
    };

    if let Err(e) = firmware.boot(config.runner.select) {
        firmware.handle_error(e);
    }
    firmware.run(config.runner.iterations);

    if let Some((stop, renderer, serializer)) = video {
        stop.store(true, Ordering::Relaxed);
        let lines = serializer.join().unwrap_or(0);
        log::info!("serializer sent {} scanlines", lines);
        match renderer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("renderer: {}", e),
            Err(_) => bail!("renderer thread panicked"),
        }
    }
    Ok(())
}
