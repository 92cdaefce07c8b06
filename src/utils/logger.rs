// Copyright (c) 2023 Beihang University, Huawei Technologies Co.,Ltd. All rights reserved.
// Rust-Shyper is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use core::fmt;

use log::{Level, Metadata, Record};
use log::{LevelFilter, SetLoggerError};
use spin::Once;

/// Console the logger writes its formatted lines to.
pub trait LogSink: Sync {
    fn write_line(&self, args: fmt::Arguments);
}

struct SimpleLogger {
    sink: Once<&'static dyn LogSink>,
}

fn level2tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "log-color")] {
        fn level2color(level: Level) -> u8 {
            match level {
                Level::Error => 31, // 31 Red
                Level::Warn => 93,  // 93 BrightYellow
                Level::Info => 34,  // 34 Blue
                Level::Debug => 32, // 32 Green
                Level::Trace => 90, // 90 BrightBlack
            }
        }

        fn emit(sink: &dyn LogSink, record: &Record) {
            sink.write_line(format_args!(
                "\u{1B}[{}m{}>[{}, {}:{}] {}\u{1B}[0m",
                level2color(record.level()),
                level2tag(record.level()),
                record.target(),
                record.file().unwrap_or("Unknown File"),
                record.line().unwrap_or(0),
                record.args()
            ));
        }
    } else {
        fn emit(sink: &dyn LogSink, record: &Record) {
            sink.write_line(format_args!(
                "{}>[{}, {}:{}] {}",
                level2tag(record.level()),
                record.target(),
                record.file().unwrap_or("Unknown File"),
                record.line().unwrap_or(0),
                record.args()
            ));
        }
    }
}

impl log::Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        self.sink.is_completed()
    }

    fn log(&self, record: &Record) {
        if let Some(sink) = self.sink.get() {
            emit(*sink, record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger { sink: Once::new() };

/// Initialize global logger writing into `sink`, filtering at `level`.
pub fn logger_init(sink: &'static dyn LogSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
