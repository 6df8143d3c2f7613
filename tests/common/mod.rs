#![allow(dead_code)]

use forthvm::{ForthError, ForthRuntime};

/// A booted VM with the prelude loaded and console output captured
pub fn forth() -> ForthRuntime {
    let mut rt = ForthRuntime::new().unwrap();
    rt.cold_start(true).unwrap();
    rt.console.capture();
    rt
}

/// A booted VM without the prelude
pub fn bare_forth() -> ForthRuntime {
    let mut rt = ForthRuntime::new().unwrap();
    rt.cold_start(false).unwrap();
    rt.console.capture();
    rt
}

/// exec interprets one line and returns what it printed
///     An error is appended the way the read loop reports it, and the VM recovers.
pub fn exec(rt: &mut ForthRuntime, line: &str) -> String {
    let result = rt.interpret_line(line);
    let mut s = rt.console.take_output();
    if let Err(err) = result {
        s.push_str(&format!("Error {}: {}", err.code(), err));
        rt.recover();
    }
    s
}

/// try_line interprets one line and returns the error, if any, recovering afterwards
pub fn try_line(rt: &mut ForthRuntime, line: &str) -> Result<(), ForthError> {
    let result = rt.interpret_line(line);
    if result.is_err() {
        rt.recover();
    }
    result
}

pub fn stack(rt: &ForthRuntime) -> Vec<i32> {
    rt.stack.contents(&rt.kernel).unwrap()
}

/// run interprets lines that must all succeed, then returns the data stack
pub fn run(rt: &mut ForthRuntime, lines: &[&str]) -> Vec<i32> {
    for line in lines {
        rt.interpret_line(line).unwrap();
    }
    stack(rt)
}
