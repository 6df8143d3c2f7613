/// Output words
///
/// Everything the VM prints goes through the Console. Normally that is stdout; tests
/// and embedders can capture it into a string instead.
///
/// Numbers are converted in the current BASE and staged in the number buffer before
/// they are typed.
///
use std::io::{self, Write};

use crate::error::{ForthError, Result};
use crate::internals::number::{format_number, format_unsigned};
use crate::runtime::{ForthRuntime, NUM_BUF_SIZE};

#[derive(Debug, Default)]
pub struct Console {
    captured: Option<Vec<u8>>,
}

impl Console {
    pub fn new() -> Console {
        Console { captured: None }
    }

    /// capture redirects output into a buffer, read back with take_output
    pub fn capture(&mut self) {
        self.captured = Some(Vec::new());
    }

    pub fn write_str(&mut self, text: &str) {
        match &mut self.captured {
            Some(buf) => buf.extend_from_slice(text.as_bytes()),
            None => print!("{}", text),
        }
    }

    pub fn write_char(&mut self, c: char) {
        match &mut self.captured {
            Some(buf) => buf.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
            None => print!("{}", c),
        }
    }

    /// write_bytes sends memory contents out unchanged
    ///     A multi-byte character written a byte at a time arrives whole.
    ///
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.captured {
            Some(buf) => buf.extend_from_slice(bytes),
            None => io::stdout().write_all(bytes)?,
        }
        Ok(())
    }

    /// flush ( -- ) Push any characters in Rust's output buffer out.
    ///     By default printed characters are buffered until a newline.
    ///     This forces them out sooner
    ///
    pub fn flush(&mut self) -> Result<()> {
        if self.captured.is_none() {
            io::stdout().flush()?;
        }
        Ok(())
    }

    /// take_output returns and clears whatever has been captured
    pub fn take_output(&mut self) -> String {
        let bytes = self.captured.as_mut().map(std::mem::take).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl ForthRuntime {
    /// emit ( c -- ) takes a character from the stack and prints it.
    ///
    pub fn f_emit(&mut self) -> Result<()> {
        let c = self.pop()?;
        self.console.write_bytes(&[c as u8])
    }

    /// type ( a u -- ) prints u characters starting at a
    pub fn f_type(&mut self) -> Result<()> {
        let len = self.pop_len()?;
        let addr = self.pop_addr()?;
        let text = self.kernel.read_bytes(addr, len)?;
        self.console.write_bytes(text)
    }

    /// type_number stages number text in the number buffer, then prints it with a trailing space
    fn type_number(&mut self, text: &str) -> Result<()> {
        if text.len() > NUM_BUF_SIZE {
            return Err(ForthError::ResultOutOfRange);
        }
        self.kernel.write_bytes(self.num_buf, text.as_bytes())?;
        let staged = self.kernel.read_bytes(self.num_buf, text.len())?;
        self.console.write_bytes(staged)?;
        self.console.write_char(' ');
        Ok(())
    }

    /// . ( n -- ) prints a signed number in the current base
    pub fn f_dot(&mut self) -> Result<()> {
        let n = self.pop()?;
        let text = format_number(n as i64, self.base()?);
        self.type_number(&text)
    }

    /// u. ( u -- ) prints an unsigned number
    pub fn f_u_dot(&mut self) -> Result<()> {
        let u = self.pop()?;
        let text = format_unsigned(u as u32 as u64, self.base()?);
        self.type_number(&text)
    }

    /// d. ( d -- ) prints a signed double
    pub fn f_d_dot(&mut self) -> Result<()> {
        let d = self.pop_double()?;
        let text = format_number(d, self.base()?);
        self.type_number(&text)
    }

    /// .s ( -- ) prints a copy of the computation stack, bottom first
    ///
    pub fn f_dot_s(&mut self) -> Result<()> {
        let base = self.base()?;
        let items: Vec<String> = self
            .stack
            .contents(&self.kernel)?
            .iter()
            .map(|v| format_number(*v as i64, base))
            .collect();
        let mut text = String::from("[ ");
        for item in items {
            text.push_str(&item);
            text.push(' ');
        }
        text.push_str("] ");
        self.console.write_str(&text);
        self.console.flush()
    }
}
