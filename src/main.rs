// forthvm main program
//
// Boots the interpreter, loads the prelude and any specified files, and runs the Forth read loop.
// The boot process is separated from the run process to allow for better error handling.
// Errors during boot stop the program; errors during the read loop are reported and the
// interpreter returns to the prompt with empty stacks.

use std::process::ExitCode;

use forthvm::config::{Config, VERSION};
use forthvm::internals::files::FileHandle;
use forthvm::{ForthRuntime, Result};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const WELCOME_MESSAGE: &str = "Welcome to forthvm.";
const EXIT_MESSAGE: &str = "Finished";

fn boot_forth(config: &Config) -> Result<ForthRuntime> {
    let mut forth = ForthRuntime::new()?;
    forth.msg.set_level(config.msg_level());
    forth.cold_start(!config.no_core)?;

    for path in &config.files {
        if let Err(err) = forth.load_file(path) {
            forth.report_error(&err);
        }
    }
    if let Some(line) = &config.eval {
        if let Err(err) = forth.interpret_line(line) {
            forth.report_error(&err);
        }
    }
    forth.console.flush()?;
    Ok(forth)
}

fn run_forth(forth: &mut ForthRuntime) {
    forth.reader = vec![FileHandle::console()];
    if forth.reader.iter().any(FileHandle::is_interactive) {
        println!("{WELCOME_MESSAGE} Version {VERSION}");
    }
    forth.f_quit();
    if forth.reader.iter().any(FileHandle::is_interactive) {
        println!("{EXIT_MESSAGE}");
    }
}

fn main() -> ExitCode {
    let mut config = Config::new();
    config.process_args();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut forth = match boot_forth(&config) {
        Ok(forth) => forth,
        Err(err) => {
            error!(code = err.code(), "boot failed: {}", err);
            eprintln!("Fatal error during initialization: {err}");
            return ExitCode::FAILURE;
        }
    };

    if !config.batch && !forth.should_exit() {
        run_forth(&mut forth);
    }
    ExitCode::SUCCESS
}
