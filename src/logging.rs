use std::fmt::Display;

use colored::Colorize;
use log::{Level, SetLoggerError};

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

/// Installs the logger. With `verbose`, debug logs of our own crates are shown too.
pub fn init_logger(verbose: bool) -> Result<(), SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(move |meta| {
            let target = Target::from_str(meta.target());

            let is_allowed =
                ALLOWED_LEVELS.contains(&meta.level()) || verbose && meta.level() == Level::Debug;
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
}

#[derive(Debug, PartialEq)]
enum Target {
    External(String),
    Main,
    Server,
    Collab,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let module = str.split("::").next().unwrap_or_default();

        match module {
            "tocatocar" => Self::Main,
            "tocatocar_server" => Self::Server,
            "tocatocar_collab" => Self::Collab,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Main => "TOCA".bright_yellow(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(Target::from_str("tocatocar_collab::themes"), Target::Collab);
        assert_eq!(Target::from_str("tocatocar_server"), Target::Server);
        assert_eq!(Target::from_str("tocatocar"), Target::Main);
        assert_eq!(
            Target::from_str("sqlx::query"),
            Target::External("sqlx".to_string())
        );
        assert!(!Target::from_str("hyper::proto").is_local());
    }
}
