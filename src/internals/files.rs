////////////////////////////
/// File: src/internals/files.rs
///
/// Line readers and the read loop.
///      Lines come from the console (a line editor when stdin is a terminal, plain
///      buffered stdin otherwise) or from source files opened by INCLUDE.
///      Readers are kept on a stack so included files can nest.
///
use crossterm::tty::IsTty;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::error::{ForthError, Result};
use crate::internals::tui::ForthLineEditor;
use crate::runtime::{ForthRuntime, TIB_SIZE};

const PROMPT: &str = "ok> ";

#[derive(Debug)]
pub enum FType {
    Stdin,                    // piped or redirected standard input
    File(BufReader<File>),    // a source file
    Tui(ForthLineEditor),     // terminal input
}

#[derive(Debug)]
pub struct FileHandle {
    pub source: FType,
    pub name: String,
    line_number: usize,
}

impl FileHandle {
    pub fn stdin() -> FileHandle {
        FileHandle {
            source: FType::Stdin,
            name: "stdin".to_string(),
            line_number: 0,
        }
    }

    /// console picks the line editor when stdin is a terminal
    pub fn console() -> FileHandle {
        if io::stdin().is_tty() {
            FileHandle {
                source: FType::Tui(ForthLineEditor::new(PROMPT)),
                name: "console".to_string(),
                line_number: 0,
            }
        } else {
            FileHandle::stdin()
        }
    }

    pub fn open(path: &str) -> Result<FileHandle> {
        let file = File::open(path).map_err(|e| ForthError::Io(format!("{}: {}", path, e)))?;
        Ok(FileHandle {
            source: FType::File(BufReader::new(file)),
            name: path.to_string(),
            line_number: 0,
        })
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.source, FType::Tui(_))
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// get_line returns the next line of text without its line ending, or None at end of input
    ///
    pub fn get_line(&mut self) -> Result<Option<String>> {
        let mut new_line = String::new();
        let chars = match &mut self.source {
            FType::Stdin => io::stdin().lock().read_line(&mut new_line)?,
            FType::File(br) => br.read_line(&mut new_line)?,
            FType::Tui(editor) => {
                let line = editor.get_line()?;
                if line.is_some() {
                    self.line_number += 1;
                }
                return Ok(line);
            }
        };
        if chars == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(new_line.trim_end_matches(|c| c == '\n' || c == '\r').to_string()))
    }
}

impl ForthRuntime {
    /// quit is the main loop in Forth, reading from the console and dispatching for evaluation
    ///     Errors are reported and the VM recovers; the loop ends at end of input or BYE.
    ///
    pub fn f_quit(&mut self) {
        while !self.should_exit() {
            let line = match self.reader.first_mut() {
                Some(reader) => reader.get_line(),
                None => break,
            };
            match line {
                Ok(Some(line)) => match self.interpret_line(&line) {
                    Ok(()) => {
                        if self.show_stack {
                            let _ = self.f_dot_s();
                        }
                    }
                    Err(err) => self.report_error(&err),
                },
                Ok(None) => break,
                Err(err) => {
                    self.report_error(&err);
                    break;
                }
            }
            if let Err(err) = self.console.flush() {
                self.msg.error("quit", "flush failed", Some(err));
            }
        }
    }

    /// load_file interprets a source file line by line
    ///     The line that asked for the file is put back afterwards, so interpretation can
    ///     continue after INCLUDE. The first error stops the file and is returned.
    ///
    pub fn load_file(&mut self, path: &str) -> Result<()> {
        let handle = FileHandle::open(path)?;
        self.msg.info("include", "loading", Some(path));
        let outer = self.kernel.read_bytes(self.tib, TIB_SIZE)?.to_vec();
        self.save_source()?;
        self.reader.push(handle);
        let depth = self.reader.len();

        let result = self.run_reader(depth);
        if let Err(err) = &result {
            if let Some(reader) = self.reader.get(depth - 1) {
                self.msg.error(
                    "include",
                    &format!("{} line {}", reader.name, reader.line_number()),
                    Some(err.to_string()),
                );
            }
        }

        self.reader.truncate(depth - 1);
        self.kernel.write_bytes(self.tib, &outer)?;
        self.restore_source()?;
        result
    }

    fn run_reader(&mut self, depth: usize) -> Result<()> {
        while !self.should_exit() {
            let line = match self.reader.get_mut(depth - 1) {
                Some(reader) => reader.get_line()?,
                None => break,
            };
            match line {
                Some(line) => self.interpret_line(&line)?,
                None => break,
            }
        }
        Ok(())
    }
}

//////////////////////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_source(name: &str, text: &str) -> String {
        let path = std::env::temp_dir().join(format!("forthvm-{}-{}.fs", name, std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn runtime() -> ForthRuntime {
        let mut rt = ForthRuntime::new().unwrap();
        rt.cold_start(false).unwrap();
        rt
    }

    #[test]
    fn test_get_line_strips_line_endings() {
        let path = temp_source("lines", "1 2\r\n3\n");
        let mut handle = FileHandle::open(&path).unwrap();
        assert_eq!(handle.get_line().unwrap(), Some("1 2".to_string()));
        assert_eq!(handle.get_line().unwrap(), Some("3".to_string()));
        assert_eq!(handle.get_line().unwrap(), None);
        assert_eq!(handle.line_number(), 2);
        assert!(!handle.is_interactive());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            FileHandle::open("/no/such/file.fs"),
            Err(ForthError::Io(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let path = temp_source("load", ": sq dup * ;\n3 sq\n");
        let mut rt = runtime();
        rt.load_file(&path).unwrap();
        assert_eq!(rt.stack.contents(&rt.kernel).unwrap(), vec![9]);
        assert_eq!(rt.reader.len(), 1);
    }

    #[test]
    fn test_include_resumes_the_line() {
        let path = temp_source("include", "10 20\n");
        let mut rt = runtime();
        rt.interpret_line(&format!("1 include {} + 2", path)).unwrap();
        assert_eq!(rt.stack.contents(&rt.kernel).unwrap(), vec![1, 30, 2]);
    }

    #[test]
    fn test_error_in_file_stops_it() {
        let path = temp_source("error", "1\nnosuchword\n2\n");
        let mut rt = runtime();
        assert_eq!(
            rt.load_file(&path),
            Err(ForthError::UndefinedWord("nosuchword".to_string()))
        );
        assert_eq!(rt.stack.contents(&rt.kernel).unwrap(), vec![1]);
        assert_eq!(rt.reader.len(), 1);
    }
}
