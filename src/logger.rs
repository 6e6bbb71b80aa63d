use chrono::Local;
use env_logger::Builder;
use log::Level;
use std::io::Write;

const RESET: &str = "\x1b[0m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m\x1b[1m",
        Level::Warn => "\x1b[33m\x1b[1m",
        Level::Info => "\x1b[32m\x1b[1m",
        Level::Debug => "\x1b[36m\x1b[1m",
        Level::Trace => "\x1b[90m\x1b[1m",
    }
}

/// Coloured `time LEVEL [file:line] message` lines; `RUST_LOG` overrides
/// the default `info` filter
pub fn init_logger() {
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}{} {:<5}{} [{}:{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level_color(record.level()),
                record.level(),
                RESET,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .init();
}
