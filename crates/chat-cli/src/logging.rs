use std::io::Write;

use colored::{ColoredString, Colorize};
use env_logger::{Env, Target};
use log::Level;

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug,hyper=info,hyper_util=info,reqwest=info"
    } else {
        "warn"
    }
}

fn level_label(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERROR".red(),
        Level::Warn => "WARN ".yellow(),
        Level::Info => "INFO ".green(),
        Level::Debug => "DEBUG".blue(),
        Level::Trace => "TRACE".dimmed(),
    }
}

/// Log to stderr; stdout carries the streamed answer. `RUST_LOG` wins.
pub fn init_logging(debug: bool) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(debug)))
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {} {} {}",
                chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                level_label(record.level()),
                format!("{}:", record.target()).dimmed(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_keeps_http_internals_quiet() {
        assert_eq!(default_filter(false), "warn");
        assert!(default_filter(true).starts_with("debug,"));
        assert!(default_filter(true).contains("reqwest=info"));
    }

    #[test]
    fn level_labels_line_up() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            assert_eq!(level_label(level).chars().count(), 5);
        }
    }
}
