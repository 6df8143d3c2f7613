// Messages: errors, warnings and information for the person at the terminal
//
// These go to stderr so they never mix with program output. Diagnostics for the
// developer go through tracing instead.

use std::fmt::Debug;

use crate::error::ForthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone)]
pub struct Msg {
    level: DebugLevel,
}

impl Default for Msg {
    fn default() -> Self {
        Self::new()
    }
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Warning,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    fn format<T: Debug>(context: &str, text: &str, data: Option<T>) -> String {
        match data {
            Some(d) => format!("{context}: {text}: {d:?}"),
            None => format!("{context}: {text}"),
        }
    }

    pub fn error<T: Debug>(&self, context: &str, text: &str, data: Option<T>) {
        eprintln!("Error: {}", Self::format(context, text, data));
    }

    pub fn warning<T: Debug>(&self, context: &str, text: &str, data: Option<T>) {
        if self.level >= DebugLevel::Warning {
            eprintln!("Warning: {}", Self::format(context, text, data));
        }
    }

    pub fn info<T: Debug>(&self, context: &str, text: &str, data: Option<T>) {
        if self.level >= DebugLevel::Info {
            eprintln!("Info: {}", Self::format(context, text, data));
        }
    }

    /// report prints a runtime error with its standard throw code
    pub fn report(&self, err: &ForthError) {
        eprintln!("Error {}: {}", err.code(), err);
    }
}
