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

    core::config::parser.rs

    Streaming YAML reader for configuration files. Sink callbacks fire in
    document order; only the action currently being read is buffered.

*/

use std::fmt;

use serde::{
    de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor},
    Deserialize,
};

use econopet_common::util::truncate_chars;

use super::{parse_hex, parse_int, run_action, Action, Condition, ConfigError, ConfigOptions, LoadFile, SetupSink, CONFIG_NAME_MAX};
use crate::error::{FirmwareError, FwResult};

struct ParseContext<'s> {
    sink:    &'s mut dyn SetupSink,
    target:  Option<usize>,
    failure: Option<FirmwareError>,
}

impl ParseContext<'_> {
    /// Park a non-syntax error so it survives the trip through serde.
    fn fail<E: de::Error>(&mut self, err: FirmwareError) -> E {
        let message = err.to_string();
        self.failure = Some(err);
        E::custom(message)
    }
}

/// An integer that may be written as a YAML integer or a prefixed string.
struct ConfigInt(u32);

impl<'de> Deserialize<'de> for ConfigInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IntVisitor;

        impl<'de> Visitor<'de> for IntVisitor {
            type Value = ConfigInt;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigInt, E> {
                u32::try_from(v)
                    .map(ConfigInt)
                    .map_err(|_| E::custom(format!("{} is out of range", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigInt, E> {
                u32::try_from(v)
                    .map(ConfigInt)
                    .map_err(|_| E::custom(format!("{} is out of range", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigInt, E> {
                parse_int(v).map(ConfigInt).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IntVisitor)
    }
}

#[derive(Deserialize)]
struct RawLoadFile {
    file: String,
    address: ConfigInt,
}

#[derive(Default)]
struct RawAction {
    kind: Option<String>,
    files: Option<Vec<RawLoadFile>>,
    address: Option<u32>,
    hex: Option<String>,
    source: Option<u32>,
    destination: Option<u32>,
    length: Option<u32>,
    columns: Option<u32>,
    video_ram_kb: Option<u32>,
    usb_keymap: Option<String>,
    start_addr: Option<u32>,
    end_addr: Option<u32>,
    fix_addr: Option<u32>,
    checksum: Option<u32>,
}

enum ActionError {
    Syntax(String),
    Invalid(ConfigError),
}

fn required<T>(value: Option<T>, action: &str, key: &str) -> Result<T, ActionError> {
    value.ok_or_else(|| ActionError::Syntax(format!("'{}' action requires '{}'", action, key)))
}

impl RawAction {
    fn into_action(self, kind: &str) -> Result<Action, ActionError> {
        match kind {
            "load" => {
                let files = required(self.files, kind, "files")?;
                Ok(Action::Load(
                    files
                        .into_iter()
                        .map(|f| LoadFile {
                            file: f.file,
                            address: f.address.0,
                        })
                        .collect(),
                ))
            }
            "patch" => {
                let address = required(self.address, kind, "address")?;
                let hex = required(self.hex, kind, "hex")?;
                let bytes = parse_hex(&hex).map_err(ActionError::Syntax)?;
                Ok(Action::Patch { address, bytes })
            }
            "copy" => Ok(Action::Copy {
                source: required(self.source, kind, "source")?,
                destination: required(self.destination, kind, "destination")?,
                length: required(self.length, kind, "length")?,
            }),
            "set" => {
                let mut options = ConfigOptions::default();
                if let Some(columns) = self.columns {
                    options.set_columns(columns).map_err(ActionError::Invalid)?;
                }
                if let Some(kb) = self.video_ram_kb {
                    options.set_video_ram_kb(kb).map_err(ActionError::Invalid)?;
                }
                options.usb_keymap = self.usb_keymap;
                Ok(Action::Set(options))
            }
            "fix-checksum" => {
                let checksum = required(self.checksum, kind, "checksum")?;
                let checksum = u8::try_from(checksum).map_err(|_| {
                    ActionError::Invalid(ConfigError::InvalidOption(format!(
                        "checksum ${:X} does not fit in a byte",
                        checksum
                    )))
                })?;
                Ok(Action::FixChecksum {
                    start: required(self.start_addr, kind, "start-addr")?,
                    end: required(self.end_addr, kind, "end-addr")?,
                    fix_addr: required(self.fix_addr, kind, "fix-addr")?,
                    checksum,
                })
            }
            _ => Err(ActionError::Syntax(format!("Unknown action type '{}'.", kind))),
        }
    }
}

struct DocumentSeed<'a, 's> {
    ctx: &'a mut ParseContext<'s>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a mapping with a 'configs' list")
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let ctx = self.ctx;
        while let Some(key) = map.next_key::<String>()? {
            if key == "configs" {
                map.next_value_seed(ConfigListSeed { ctx: &mut *ctx })?;
            }
            else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct ConfigListSeed<'a, 's> {
    ctx: &'a mut ParseContext<'s>,
}

impl<'de> DeserializeSeed<'de> for ConfigListSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ConfigListSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of configurations")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let ctx = self.ctx;
        let mut index = 0;
        while seq.next_element_seed(ConfigSeed { ctx: &mut *ctx, index })?.is_some() {
            index += 1;
        }
        Ok(())
    }
}

struct ConfigSeed<'a, 's> {
    ctx:   &'a mut ParseContext<'s>,
    index: usize,
}

impl<'de> DeserializeSeed<'de> for ConfigSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ConfigSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a configuration with a name and setup actions")
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let ConfigSeed { ctx, index } = self;
        let active = ctx.target == Some(index);
        ctx.sink.on_enter_config();

        let mut name = String::new();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "name" => name = truncate_chars(&map.next_value::<String>()?, CONFIG_NAME_MAX),
                "setup" => map.next_value_seed(ActionListSeed { ctx: &mut *ctx, active })?,
                _ => {
                    log::debug!("config: ignoring key '{}'", key);
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if active {
            log::info!("Config: {}", name);
        }
        ctx.sink.on_exit_config(&name);
        Ok(())
    }
}

struct ActionListSeed<'a, 's> {
    ctx:    &'a mut ParseContext<'s>,
    active: bool,
}

impl<'de> DeserializeSeed<'de> for ActionListSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ActionListSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a list of setup actions")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let ActionListSeed { ctx, active } = self;
        while seq.next_element_seed(ActionSeed { ctx: &mut *ctx, active })?.is_some() {}
        Ok(())
    }
}

struct ActionSeed<'a, 's> {
    ctx:    &'a mut ParseContext<'s>,
    active: bool,
}

impl<'de> DeserializeSeed<'de> for ActionSeed<'_, '_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ActionSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an 'action' or an 'if' block")
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let ActionSeed { ctx, active } = self;
        let mut raw = RawAction::default();
        let mut condition: Option<bool> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "if" => {
                    let text: String = map.next_value()?;
                    let cond = text.parse::<Condition>().map_err(de::Error::custom)?;
                    let (model, video) = ctx.sink.pet_model();
                    condition = Some(cond.holds(model, video));
                }
                "then" | "else" => {
                    let Some(holds) = condition
                    else {
                        return Err(de::Error::custom(format!("'{}' must follow 'if'", key)));
                    };
                    let taken = holds == (key == "then");
                    map.next_value_seed(ActionListSeed {
                        ctx: &mut *ctx,
                        active: active && taken,
                    })?;
                }
                "action" => raw.kind = Some(map.next_value()?),
                "files" => raw.files = Some(map.next_value()?),
                "address" => raw.address = Some(map.next_value::<ConfigInt>()?.0),
                "hex" => raw.hex = Some(map.next_value()?),
                "source" => raw.source = Some(map.next_value::<ConfigInt>()?.0),
                "destination" => raw.destination = Some(map.next_value::<ConfigInt>()?.0),
                "length" => raw.length = Some(map.next_value::<ConfigInt>()?.0),
                "columns" => raw.columns = Some(map.next_value::<ConfigInt>()?.0),
                "video-ram-kb" => raw.video_ram_kb = Some(map.next_value::<ConfigInt>()?.0),
                "usb-keymap" => raw.usb_keymap = Some(map.next_value()?),
                "start-addr" => raw.start_addr = Some(map.next_value::<ConfigInt>()?.0),
                "end-addr" => raw.end_addr = Some(map.next_value::<ConfigInt>()?.0),
                "fix-addr" => raw.fix_addr = Some(map.next_value::<ConfigInt>()?.0),
                "checksum" => raw.checksum = Some(map.next_value::<ConfigInt>()?.0),
                _ => {
                    log::debug!("config: ignoring key '{}'", key);
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let Some(kind) = raw.kind.take()
        else {
            if condition.is_some() {
                return Ok(());
            }
            return Err(de::Error::custom("expected 'action' or 'if'"));
        };
        if condition.is_some() {
            return Err(de::Error::custom("an 'if' block cannot also be an action"));
        }

        let action = match raw.into_action(&kind) {
            Ok(action) => action,
            Err(ActionError::Syntax(message)) => return Err(de::Error::custom(message)),
            Err(ActionError::Invalid(e)) => return Err(ctx.fail(e.into())),
        };
        if active {
            log::debug!("setup: {}", action);
            if let Err(e) = run_action(&mut *ctx.sink, &action) {
                return Err(ctx.fail(e));
            }
        }
        Ok(())
    }
}

/// Parse a configuration document. `file` is only used in error reports.
///
/// Every configuration fires `on_enter_config`/`on_exit_config`; only the
/// `target`-th one has its actions delivered. A syntax error, an invalid
/// option or a failing sink callback stops the parse and is returned.
pub fn parse_config(file: &str, data: &[u8], sink: &mut dyn SetupSink, target: Option<usize>) -> FwResult<()> {
    let mut ctx = ParseContext {
        sink,
        target,
        failure: None,
    };
    let result = DocumentSeed { ctx: &mut ctx }.deserialize(serde_yaml::Deserializer::from_slice(data));

    if let Some(failure) = ctx.failure.take() {
        log::warn!("'{}': {}", file, failure);
        return Err(failure);
    }
    result.map_err(|e| {
        let (line, column) = e.location().map(|l| (l.line(), l.column())).unwrap_or((0, 0));
        let err = ConfigError::Parse {
            file: file.to_string(),
            line,
            column,
            message: e.to_string(),
        };
        log::warn!("{}", err);
        err.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DisplayColumns, PetKeyboardModel, PetVideoType};

    #[derive(Default)]
    struct Recorder {
        model: Option<PetKeyboardModel>,
        enters: usize,
        exits: Vec<String>,
        loads: Vec<(String, u32)>,
        patches: Vec<(u32, Vec<u8>)>,
        copies: Vec<(u32, u32, u32)>,
        options: Vec<ConfigOptions>,
        checksums: Vec<(u32, u32, u32, u8)>,
        fail_loads: bool,
    }

    impl SetupSink for Recorder {
        fn on_enter_config(&mut self) {
            self.enters += 1;
        }

        fn on_exit_config(&mut self, name: &str) {
            self.exits.push(name.to_string());
        }

        fn pet_model(&self) -> (PetKeyboardModel, PetVideoType) {
            (self.model.unwrap_or(PetKeyboardModel::Graphics), PetVideoType::Crtc)
        }

        fn on_load(&mut self, file: &str, address: u32) -> FwResult<()> {
            if self.fail_loads {
                return Err(crate::error::FsError::NotAbsolute(file.to_string()).into());
            }
            self.loads.push((file.to_string(), address));
            Ok(())
        }

        fn on_patch(&mut self, address: u32, bytes: &[u8]) -> FwResult<()> {
            self.patches.push((address, bytes.to_vec()));
            Ok(())
        }

        fn on_copy(&mut self, source: u32, destination: u32, length: u32) -> FwResult<()> {
            self.copies.push((source, destination, length));
            Ok(())
        }

        fn on_set_options(&mut self, options: &ConfigOptions) -> FwResult<()> {
            self.options.push(options.clone());
            Ok(())
        }

        fn on_set_keymap(&mut self, _file: &str) -> FwResult<()> {
            Ok(())
        }

        fn on_fix_checksum(&mut self, start: u32, end: u32, fix_addr: u32, expected: u8) -> FwResult<()> {
            self.checksums.push((start, end, fix_addr, expected));
            Ok(())
        }
    }

    fn run(yaml: &str, target: Option<usize>) -> Recorder {
        let mut sink = Recorder::default();
        parse_config("/config.yaml", yaml.as_bytes(), &mut sink, target).unwrap();
        sink
    }

    const TWO_CONFIGS: &str = "\
configs:
  - name: First
    setup:
      - action: set
        columns: 40
  - name: Second
    setup:
      - action: set
        columns: 80
";

    #[test]
    fn minimal_config() {
        let sink = run("configs:\n  - name: Test Config\n    setup: []\n", Some(0));
        assert_eq!(sink.enters, 1);
        assert_eq!(sink.exits, ["Test Config"]);
    }

    #[test]
    fn enumeration_fires_no_actions() {
        let sink = run(TWO_CONFIGS, None);
        assert_eq!(sink.enters, 2);
        assert_eq!(sink.exits, ["First", "Second"]);
        assert!(sink.options.is_empty());
    }

    #[test]
    fn target_selects_one_config() {
        let sink = run(TWO_CONFIGS, Some(1));
        assert_eq!(sink.options.len(), 1);
        assert_eq!(sink.options[0].columns, DisplayColumns::Eighty);
        assert_eq!(sink.exits, ["First", "Second"]);
    }

    #[test]
    fn load_action_with_several_files() {
        let yaml = "\
configs:
  - name: Multi Load Test
    setup:
      - action: load
        files:
          - file: file1.bin
            address: 0x8000
          - file: file2.bin
            address: 49152
          - { file: file3.bin, address: \"0xE000\" }
";
        let sink = run(yaml, Some(0));
        assert_eq!(
            sink.loads,
            vec![
                ("file1.bin".to_string(), 0x8000),
                ("file2.bin".to_string(), 0xC000),
                ("file3.bin".to_string(), 0xE000),
            ]
        );
    }

    #[test]
    fn patch_copy_and_checksum_actions() {
        let yaml = "\
configs:
  - name: Mixed
    setup:
      - action: patch
        address: 0x8000
        hex: DEADBEEF
      - action: copy
        source: 0x1000
        destination: 0x2000
        length: 256
      - action: fix-checksum
        start-addr: 0xC000
        end-addr: 0xE000
        fix-addr: 0xE001
        checksum: 0x42
";
        let sink = run(yaml, Some(0));
        assert_eq!(sink.patches, vec![(0x8000, vec![0xDE, 0xAD, 0xBE, 0xEF])]);
        assert_eq!(sink.copies, vec![(0x1000, 0x2000, 256)]);
        assert_eq!(sink.checksums, vec![(0xC000, 0xE000, 0xE001, 0x42)]);
    }

    #[test]
    fn set_options_map_video_ram() {
        for (kb, mask) in [(1, 0u8), (2, 1), (3, 2), (4, 3)] {
            let yaml = format!(
                "configs:\n  - name: V\n    setup:\n      - action: set\n        video-ram-kb: {}\n",
                kb
            );
            let sink = run(&yaml, Some(0));
            assert_eq!(sink.options[0].video_ram_mask, mask);
            assert_eq!(sink.options[0].columns, DisplayColumns::Forty);
        }

        let sink = run(
            "configs:\n  - name: K\n    setup:\n      - action: set\n        columns: 80\n        video-ram-kb: 2\n        usb-keymap: custom_keymap.bin\n",
            Some(0),
        );
        assert_eq!(
            sink.options[0],
            ConfigOptions {
                columns: DisplayColumns::Eighty,
                video_ram_mask: 1,
                usb_keymap: Some("custom_keymap.bin".to_string()),
            }
        );
    }

    const CONDITIONAL: &str = "\
configs:
  - name: Conditional Test
    setup:
      - if: graphics
        then:
          - action: set
            columns: 40
        else:
          - action: set
            columns: 80
";

    #[test]
    fn conditional_branches_follow_model() {
        let sink = run(CONDITIONAL, Some(0));
        assert_eq!(sink.options.len(), 1);
        assert_eq!(sink.options[0].columns, DisplayColumns::Forty);

        let mut sink = Recorder {
            model: Some(PetKeyboardModel::Business),
            ..Default::default()
        };
        parse_config("/config.yaml", CONDITIONAL.as_bytes(), &mut sink, Some(0)).unwrap();
        assert_eq!(sink.options.len(), 1);
        assert_eq!(sink.options[0].columns, DisplayColumns::Eighty);
    }

    #[test]
    fn unknown_action_reports_location() {
        let yaml = "configs:\n  - name: Bad\n    setup:\n      - action: explode\n";
        let mut sink = Recorder::default();
        let err = parse_config("/config.yaml", yaml.as_bytes(), &mut sink, Some(0)).unwrap_err();
        match err {
            FirmwareError::Config(ConfigError::Parse { file, message, .. }) => {
                assert_eq!(file, "/config.yaml");
                assert!(message.contains("Unknown action type 'explode'."));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(sink.loads.is_empty());
    }

    #[test]
    fn invalid_option_aborts() {
        let yaml = "configs:\n  - name: Bad\n    setup:\n      - action: set\n        columns: 64\n";
        let mut sink = Recorder::default();
        let err = parse_config("/config.yaml", yaml.as_bytes(), &mut sink, Some(0)).unwrap_err();
        assert!(matches!(err, FirmwareError::Config(ConfigError::InvalidOption(_))));
        assert!(!err.is_fatal());
        assert!(sink.options.is_empty());
    }

    #[test]
    fn sink_errors_propagate() {
        let yaml = "configs:\n  - name: L\n    setup:\n      - action: load\n        files:\n          - file: a.bin\n            address: 0\n";
        let mut sink = Recorder {
            fail_loads: true,
            ..Default::default()
        };
        let err = parse_config("/config.yaml", yaml.as_bytes(), &mut sink, Some(0)).unwrap_err();
        assert!(matches!(err, FirmwareError::Fs(_)));
        assert!(err.is_fatal());

        // Not the target: never reaches the sink.
        let mut sink = Recorder {
            fail_loads: true,
            ..Default::default()
        };
        parse_config("/config.yaml", yaml.as_bytes(), &mut sink, None).unwrap();
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let mut sink = Recorder::default();
        let err = parse_config("/config.yaml", b"configs: [\n", &mut sink, Some(0)).unwrap_err();
        assert!(matches!(err, FirmwareError::Config(ConfigError::Parse { .. })));
    }
}
