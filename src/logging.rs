use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,  // default: retries and skipped commits
        1 => LevelFilter::Info,  // -v: requests and git commands
        2 => LevelFilter::Debug, // -vv: token usage, parsed results
        _ => LevelFilter::Trace, // -vvv: prompts and raw responses
    }
}

pub fn init_logger(verbosity: u8) {
    let mut builder = Builder::new();
    // Only our own crate gets chatty; reqwest and friends stay at warn.
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("commit_critic", level_for(verbosity));

    builder.format(|buf, record| {
        let level_label = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn  => "WARN ".yellow().bold(),
            Level::Info  => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        writeln!(buf, "{} {}", level_label, record.args())
    });

    builder.init();
}
