use crate::config::LogConfig;

use std::fs::OpenOptions;
use std::str::FromStr;

use simplelog::{ColorChoice, LevelFilter, TerminalMode, TermLogger, WriteLogger};


pub fn init_logger(cfg: &LogConfig) {
    let level = LevelFilter::from_str(&cfg.level).unwrap_or_else(|_| {
        eprintln!("Unsupported log level: {}, use `info` by default", cfg.level);
        LevelFilter::Info
    });

    match cfg.kind.as_str() {
        "console" => init_term_logger(level),
        "file"    => init_file_logger(level, &cfg.file),
        _         => {
            eprintln!(
                "Unsupported log kind: {}, only `file` and `console` are supported. Use `console` by default",
                cfg.kind
            );
            init_term_logger(level);
        }
    };
}


fn prepare_logger_config() -> simplelog::Config {
    simplelog::ConfigBuilder::new().set_time_format_custom(
        simplelog::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        )
    ).build()
}

fn init_term_logger(level: LevelFilter) {
    TermLogger::init(
        level,
        prepare_logger_config(),
        TerminalMode::Stderr, ColorChoice::Auto
    ).unwrap();
}

fn init_file_logger(level: LevelFilter, filename: &String) {
    WriteLogger::init(
        level,
        prepare_logger_config(),
        OpenOptions::new().write(true).create(true).append(true).open(filename).unwrap()
    ).unwrap()
}
