use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-queue-capacity")
                .long("email-queue-capacity")
                .help("Outbound email queue capacity")
                .env("VACQ_EMAIL_QUEUE_CAPACITY")
                .default_value("256")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("email-max-attempts")
                .long("email-max-attempts")
                .help("Delivery attempts before a message is dropped")
                .env("VACQ_EMAIL_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("email-retry-backoff-ms")
                .long("email-retry-backoff-ms")
                .help("Delay between delivery attempts in milliseconds")
                .env("VACQ_EMAIL_RETRY_BACKOFF_MS")
                .default_value("100")
                .value_parser(clap::value_parser!(u64)),
        )
}

pub struct Options {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &clap::ArgMatches) -> Self {
        Self {
            queue_capacity: matches
                .get_one::<usize>("email-queue-capacity")
                .copied()
                .unwrap_or(256),
            max_attempts: matches
                .get_one::<u32>("email-max-attempts")
                .copied()
                .unwrap_or(3),
            retry_backoff_ms: matches
                .get_one::<u64>("email-retry-backoff-ms")
                .copied()
                .unwrap_or(100),
        }
    }
}
