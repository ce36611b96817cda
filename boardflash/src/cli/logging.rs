use env_logger::Env;
use log::LevelFilter;

/// Initialize the logger with the given [LevelFilter], unless overridden by
/// the `RUST_LOG` environment variable.
pub fn initialize_logger(filter: LevelFilter) {
    env_logger::Builder::from_env(Env::default().default_filter_or(filter.as_str()))
        .format_target(false)
        .init();
}

/// Map the number of `-v` flags to a [LevelFilter]
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Info);
        assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(5), LevelFilter::Trace);
    }
}
