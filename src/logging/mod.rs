use tracing::Dispatch;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Target prefix of every event this binary emits.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Filter directive for a `-v` count.
pub fn filter_for(verbose: u8) -> String {
    match verbose {
        0 => format!("{CRATE_TARGET}=info,warn"),
        1 => format!("{CRATE_TARGET}=debug,info"),
        _ => "trace".to_string(),
    }
}

/// Build a stderr logger. Nothing is installed globally: the caller attaches
/// the returned dispatcher to the future it runs.
pub fn build_dispatch(verbose: u8) -> Dispatch {
    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(filter_for(verbose)));
    Dispatch::new(subscriber)
}
