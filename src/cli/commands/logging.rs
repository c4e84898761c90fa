use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Normalize `VACQ_LOG_LEVEL` into the `-v` repeat count: accepts a
/// count up to 5 or a level name.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(count) = level.parse::<u8>() {
            if count <= 5 {
                return Ok(count);
            }
            return Err(format!("verbosity count out of range: {count}"));
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err(format!("unknown log level: {level}")),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity, repeat for more detail (-vv); VACQ_LOG_LEVEL also takes a level name")
            .env("VACQ_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_args(Command::new("vacq"))
    }

    #[test]
    fn env_level_names_are_normalized() {
        temp_env::with_var("VACQ_LOG_LEVEL", Some("debug"), || {
            let matches = command().get_matches_from(["vacq"]);
            assert_eq!(matches.get_count(ARG_VERBOSITY), 3);
        });
    }

    #[test]
    fn env_accepts_numeric_counts() {
        temp_env::with_var("VACQ_LOG_LEVEL", Some("5"), || {
            let matches = command().get_matches_from(["vacq"]);
            assert_eq!(matches.get_count(ARG_VERBOSITY), 5);
        });
    }

    #[test]
    fn env_rejects_out_of_range_and_unknown_levels() {
        temp_env::with_var("VACQ_LOG_LEVEL", Some("9"), || {
            assert!(command().try_get_matches_from(["vacq"]).is_err());
        });
        temp_env::with_var("VACQ_LOG_LEVEL", Some("loud"), || {
            assert!(command().try_get_matches_from(["vacq"]).is_err());
        });
    }

    #[test]
    fn repeated_flags_accumulate() {
        temp_env::with_var("VACQ_LOG_LEVEL", None::<&str>, || {
            let matches = command().get_matches_from(["vacq", "-vv"]);
            assert_eq!(matches.get_count(ARG_VERBOSITY), 2);
        });
    }
}
