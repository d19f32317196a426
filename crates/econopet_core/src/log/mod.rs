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

    core::log::mod.rs

    Ring-buffered firmware log. Each level keeps its own fixed ring so a
    burst of debug chatter cannot push warnings out; a merge iterator
    replays the rings in timestamp order.

*/

use std::{
    fmt::{self, Write},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use strum_macros::{Display, EnumIter};

use econopet_common::util::format_timestamp_us;

use crate::{hal::Clock, hw::FIRMWARE_BANNER};

pub const LOG_DEBUG_ENTRIES: usize = 16;
pub const LOG_INFO_ENTRIES: usize = 16;
pub const LOG_WARN_ENTRIES: usize = 8;

/// Bytes reserved per message, including the terminating NUL.
pub const LOG_MESSAGE_SIZE: usize = 56;
pub const LOG_MESSAGE_MAX_BYTES: usize = LOG_MESSAGE_SIZE - 1;

const LEVEL_COUNT: usize = 3;

#[derive(Copy, Clone, Debug, Display, EnumIter, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
}

impl LogLevel {
    pub fn prefix(self) -> char {
        match self {
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
        }
    }

    fn from_index(index: usize) -> LogLevel {
        match index {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            _ => LogLevel::Warn,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Info,
            log::Level::Warn | log::Level::Error => LogLevel::Warn,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "debug" | "d" => Ok(LogLevel::Debug),
            "info" | "i" => Ok(LogLevel::Info),
            "warn" | "w" => Ok(LogLevel::Warn),
            _ => Err(format!("Unknown log level '{}'", s)),
        }
    }
}

/// One 64-byte record. Messages are UTF-8, cut at a character boundary and
/// NUL padded.
#[derive(Copy, Clone, PartialEq)]
#[repr(C)]
pub struct LogEntry {
    pub timestamp_us: u64,
    message: [u8; LOG_MESSAGE_SIZE],
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            timestamp_us: 0,
            message: [0; LOG_MESSAGE_SIZE],
        }
    }
}

impl LogEntry {
    pub fn message(&self) -> &str {
        let len = self.message.iter().position(|b| *b == 0).unwrap_or(LOG_MESSAGE_MAX_BYTES);
        match std::str::from_utf8(&self.message[..len]) {
            Ok(text) => text,
            Err(e) => std::str::from_utf8(&self.message[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    fn set_message(&mut self, args: fmt::Arguments<'_>) {
        self.message = [0; LOG_MESSAGE_SIZE];
        let mut writer = MessageWriter {
            buf: &mut self.message[..LOG_MESSAGE_MAX_BYTES],
            len: 0,
        };
        // Overflow is truncation, not an error.
        let _ = fmt::write(&mut writer, args);
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("timestamp_us", &self.timestamp_us)
            .field("message", &self.message())
            .finish()
    }
}

/// Formats into a fixed buffer, dropping whatever does not fit whole.
struct MessageWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl fmt::Write for MessageWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.len;
        let mut end = s.len().min(room);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf[self.len..self.len + end].copy_from_slice(&s.as_bytes()[..end]);
        self.len += end;
        if end < s.len() {
            // Stop here so a later short piece cannot land after a cut one.
            self.len = self.buf.len();
            return Err(fmt::Error);
        }
        Ok(())
    }
}

struct LogRing {
    entries: Vec<LogEntry>,
    mask:    usize,
    head:    usize,
    count:   usize,
}

impl LogRing {
    fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "log ring capacity must be a power of two");
        Self {
            entries: vec![LogEntry::default(); capacity],
            mask: capacity - 1,
            head: 0,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, timestamp_us: u64, args: fmt::Arguments<'_>) {
        let entry = &mut self.entries[self.head];
        entry.timestamp_us = timestamp_us;
        entry.set_message(args);

        // Overwrites the oldest entry once full.
        self.head = (self.head + 1) & self.mask;
        if self.count < self.capacity() {
            self.count += 1;
        }
    }

    fn oldest(&self) -> usize {
        self.head.wrapping_sub(self.count) & self.mask
    }
}

pub struct LogBuffer {
    clock: Arc<dyn Clock>,
    rings: [LogRing; LEVEL_COUNT],
    boot_time_us: u64,
    last_timestamp_us: u64,
}

impl LogBuffer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let boot_time_us = clock.now_us();
        Self {
            clock,
            rings: [
                LogRing::new(LOG_DEBUG_ENTRIES),
                LogRing::new(LOG_INFO_ENTRIES),
                LogRing::new(LOG_WARN_ENTRIES),
            ],
            boot_time_us,
            last_timestamp_us: boot_time_us,
        }
    }

    /// Record the firmware banner. Called once after the logger is installed.
    pub fn log_banner(&mut self) {
        self.push(LogLevel::Warn, FIRMWARE_BANNER);
    }

    pub fn push(&mut self, level: LogLevel, message: &str) {
        self.push_args(level, format_args!("{}", message));
    }

    /// Record a formatted message without building an intermediate string.
    pub fn push_args(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        // Entries sort by timestamp, so ties are broken by nudging forward.
        let mut now = self.clock.now_us();
        if now <= self.last_timestamp_us {
            now = self.last_timestamp_us + 1;
        }
        self.last_timestamp_us = now;

        self.rings[level as usize].push(now, args);
    }

    pub fn boot_time_us(&self) -> u64 {
        self.boot_time_us
    }

    pub fn uptime_us(&self) -> u64 {
        self.clock.now_us().saturating_sub(self.boot_time_us)
    }

    pub fn entry_count(&self, min_level: LogLevel) -> usize {
        self.rings[min_level as usize..].iter().map(|r| r.count).sum()
    }

    /// Iterate the rings at or above `min_level`, oldest first.
    pub fn iter(&self, min_level: LogLevel) -> LogIter<'_> {
        let mut iter = LogIter {
            buffer:    self,
            pos:       [0; LEVEL_COUNT],
            remaining: [0; LEVEL_COUNT],
        };
        for level in min_level as usize..LEVEL_COUNT {
            iter.pos[level] = self.rings[level].oldest();
            iter.remaining[level] = self.rings[level].count;
        }
        iter
    }

    /// Format an entry as `[   s.mmm] L: message`, relative to boot.
    pub fn format_entry(&self, level: LogLevel, entry: &LogEntry) -> String {
        let mut line = format_timestamp_us(entry.timestamp_us.saturating_sub(self.boot_time_us));
        let _ = write!(line, " {}: {}", level.prefix(), entry.message());
        line
    }
}

/// A snapshot of ring positions taken when the iterator was created.
pub struct LogIter<'a> {
    buffer:    &'a LogBuffer,
    pos:       [usize; LEVEL_COUNT],
    remaining: [usize; LEVEL_COUNT],
}

impl<'a> Iterator for LogIter<'a> {
    type Item = (LogLevel, &'a LogEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let mut oldest: Option<(usize, u64)> = None;
        for level in 0..LEVEL_COUNT {
            if self.remaining[level] == 0 {
                continue;
            }
            let ts = self.buffer.rings[level].entries[self.pos[level]].timestamp_us;
            if oldest.map_or(true, |(_, best)| ts < best) {
                oldest = Some((level, ts));
            }
        }

        let (level, _) = oldest?;
        let ring = &self.buffer.rings[level];
        let entry = &ring.entries[self.pos[level]];
        self.pos[level] = (self.pos[level] + 1) & ring.mask;
        self.remaining[level] -= 1;
        Some((LogLevel::from_index(level), entry))
    }
}

pub type SharedLog = Arc<Mutex<LogBuffer>>;

pub fn lock_log(log: &SharedLog) -> MutexGuard<'_, LogBuffer> {
    match log.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// `log` facade backend that records into the rings and optionally forwards
/// to another logger.
pub struct RingLogger {
    buffer:   SharedLog,
    delegate: Option<Box<dyn log::Log>>,
    level:    log::LevelFilter,
}

impl RingLogger {
    pub fn new(buffer: SharedLog) -> Self {
        Self {
            buffer,
            delegate: None,
            level: log::LevelFilter::Debug,
        }
    }

    pub fn with_delegate(mut self, delegate: Box<dyn log::Log>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_level(mut self, level: log::LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Install as the global logger.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl log::Log for RingLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            lock_log(&self.buffer).push_args(record.level().into(), *record.args());
        }
        if let Some(delegate) = &self.delegate {
            if delegate.enabled(record.metadata()) {
                delegate.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(delegate) = &self.delegate {
            delegate.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ManualClock;
    use log::Log;

    fn setup() -> (Arc<ManualClock>, LogBuffer) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let buffer = LogBuffer::new(clock.clone());
        (clock, buffer)
    }

    fn messages(buffer: &LogBuffer, min_level: LogLevel) -> Vec<String> {
        buffer.iter(min_level).map(|(_, e)| e.message().to_string()).collect()
    }

    #[test]
    fn starts_empty() {
        let (_, buffer) = setup();
        assert_eq!(buffer.entry_count(LogLevel::Debug), 0);
        assert!(buffer.iter(LogLevel::Debug).next().is_none());
        assert_eq!(buffer.boot_time_us(), 1_000_000);
    }

    #[test]
    fn single_entry() {
        let (clock, mut buffer) = setup();
        clock.advance_us(500);
        buffer.push(LogLevel::Info, "Test message 42");

        let mut iter = buffer.iter(LogLevel::Debug);
        let (level, entry) = iter.next().unwrap();
        assert_eq!(level, LogLevel::Info);
        assert_eq!(entry.message(), "Test message 42");
        assert_eq!(entry.timestamp_us, 1_000_500);
        assert!(iter.next().is_none());
    }

    #[test]
    fn counts_by_minimum_level() {
        let (_, mut buffer) = setup();
        buffer.push(LogLevel::Debug, "debug");
        buffer.push(LogLevel::Info, "info");
        buffer.push(LogLevel::Warn, "warn");
        assert_eq!(buffer.entry_count(LogLevel::Debug), 3);
        assert_eq!(buffer.entry_count(LogLevel::Info), 2);
        assert_eq!(buffer.entry_count(LogLevel::Warn), 1);
    }

    #[test]
    fn full_ring_drops_oldest() {
        let (clock, mut buffer) = setup();
        for i in 0..LOG_WARN_ENTRIES + 4 {
            clock.advance_us(10);
            buffer.push(LogLevel::Warn, &format!("Message {}", i));
        }
        assert_eq!(buffer.entry_count(LogLevel::Warn), LOG_WARN_ENTRIES);

        let expected: Vec<String> = (4..LOG_WARN_ENTRIES + 4).map(|i| format!("Message {}", i)).collect();
        assert_eq!(messages(&buffer, LogLevel::Debug), expected);
    }

    #[test]
    fn merge_is_chronological_across_levels() {
        let (_, mut buffer) = setup();
        // The clock does not move; tie-breaking keeps insertion order.
        buffer.push(LogLevel::Debug, "D1");
        buffer.push(LogLevel::Info, "I1");
        buffer.push(LogLevel::Warn, "W1");
        buffer.push(LogLevel::Debug, "D2");
        buffer.push(LogLevel::Info, "I2");

        assert_eq!(messages(&buffer, LogLevel::Debug), ["D1", "I1", "W1", "D2", "I2"]);

        let stamps: Vec<u64> = buffer.iter(LogLevel::Debug).map(|(_, e)| e.timestamp_us).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn minimum_level_filters() {
        let (_, mut buffer) = setup();
        buffer.push(LogLevel::Debug, "D1");
        buffer.push(LogLevel::Info, "I1");
        buffer.push(LogLevel::Warn, "W1");
        buffer.push(LogLevel::Debug, "D2");

        assert_eq!(messages(&buffer, LogLevel::Info), ["I1", "W1"]);
        assert_eq!(messages(&buffer, LogLevel::Warn), ["W1"]);
    }

    #[test]
    fn formats_relative_to_boot() {
        let (clock, mut buffer) = setup();
        clock.advance_us(1_234_567);
        buffer.push(LogLevel::Warn, "disk full");
        let (level, entry) = buffer.iter(LogLevel::Debug).next().unwrap();
        assert_eq!(buffer.format_entry(level, entry), "[   1.234] W: disk full");
    }

    #[test]
    fn long_messages_are_truncated() {
        let (_, mut buffer) = setup();
        let long = "x".repeat(100);
        buffer.push(LogLevel::Info, &long);
        let (_, entry) = buffer.iter(LogLevel::Debug).next().unwrap();
        assert_eq!(entry.message(), &long[..LOG_MESSAGE_MAX_BYTES]);
    }

    #[test]
    fn entries_are_fixed_size() {
        assert_eq!(std::mem::size_of::<LogEntry>(), 64);
    }

    #[test]
    fn truncation_keeps_whole_characters() {
        let (_, mut buffer) = setup();
        // Two bytes each; 55 bytes of room holds 27 of them.
        let wide = "µ".repeat(40);
        buffer.push(LogLevel::Info, &wide);
        buffer.push_args(LogLevel::Info, format_args!("{}{}", "ab", "µ".repeat(40)));
        let entries: Vec<String> = messages(&buffer, LogLevel::Debug);
        assert_eq!(entries[0], "µ".repeat(27));
        assert_eq!(entries[1], format!("ab{}", "µ".repeat(26)));
    }

    #[test]
    fn logger_routes_levels() {
        let (_, buffer) = setup();
        let shared: SharedLog = Arc::new(Mutex::new(buffer));
        let logger = RingLogger::new(shared.clone()).with_level(log::LevelFilter::Trace);

        for (level, text) in [
            (log::Level::Trace, "trace"),
            (log::Level::Info, "info"),
            (log::Level::Error, "error"),
        ] {
            logger.log(
                &log::Record::builder()
                    .level(level)
                    .args(format_args!("{}", text))
                    .build(),
            );
        }

        let log = lock_log(&shared);
        let levels: Vec<(LogLevel, String)> = log
            .iter(LogLevel::Debug)
            .map(|(l, e)| (l, e.message().to_string()))
            .collect();
        assert_eq!(
            levels,
            vec![
                (LogLevel::Debug, "trace".to_string()),
                (LogLevel::Info, "info".to_string()),
                (LogLevel::Warn, "error".to_string()),
            ]
        );
    }

    #[test]
    fn level_names_parse() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
