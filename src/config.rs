// system configuration and command line processing

use argh::FromArgs;

use crate::internals::messages::DebugLevel;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(FromArgs, Debug, Default)]
/// command line arguments for forthvm.
pub struct Config {
    /// load a source file at startup (may be repeated).
    #[argh(option, short = 'f', long = "file")]
    pub files: Vec<String>,

    /// skip loading the Forth prelude.
    #[argh(switch, short = 'n')]
    pub no_core: bool,

    /// interpret a line of Forth after loading files.
    #[argh(option, short = 'e')]
    pub eval: Option<String>,

    /// exit after loading instead of reading from the console.
    #[argh(switch, short = 'b')]
    pub batch: bool,

    /// log at debug level unless RUST_LOG says otherwise.
    #[argh(switch, short = 'v')]
    pub verbose: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_args(&mut self) {
        *self = argh::from_env();
    }

    /// msg_level is how chatty the user-facing reporter is: --verbose adds info messages
    pub fn msg_level(&self) -> DebugLevel {
        if self.verbose {
            DebugLevel::Info
        } else {
            DebugLevel::Warning
        }
    }

    /// the tracing filter used when RUST_LOG is not set
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "forthvm=debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::from_args(&["forthvm"], args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert!(config.files.is_empty());
        assert!(!config.no_core && !config.batch && !config.verbose);
        assert_eq!(config.eval, None);
        assert_eq!(config.log_filter(), "warn");
        assert_eq!(config.msg_level(), DebugLevel::Warning);
    }

    #[test]
    fn test_repeated_files() {
        let config = parse(&["-f", "a.fs", "--file", "b.fs", "-n", "-b"]);
        assert_eq!(config.files, vec!["a.fs".to_string(), "b.fs".to_string()]);
        assert!(config.no_core);
        assert!(config.batch);
    }

    #[test]
    fn test_eval_and_verbose() {
        let config = parse(&["-e", "1 2 + .", "-v"]);
        assert_eq!(config.eval.as_deref(), Some("1 2 + ."));
        assert_eq!(config.log_filter(), "forthvm=debug");
        assert_eq!(config.msg_level(), DebugLevel::Info);
    }
}
