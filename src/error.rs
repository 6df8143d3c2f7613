//! Runtime errors
//!
//! Every detection point in the VM returns one of these. Only the top-level read loop
//! catches them; see `ForthRuntime::recover`.

use thiserror::Error;

use crate::internals::stack::StackKind;

/// Runtime result type
pub type Result<T> = std::result::Result<T, ForthError>;

/// Runtime errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForthError {
    #[error("{0} stack overflow")]
    StackOverflow(StackKind),

    #[error("{0} stack underflow")]
    StackUnderflow(StackKind),

    #[error("dictionary overflow")]
    DictionaryOverflow,

    #[error("memory overflow")]
    MemoryOverflow,

    #[error("invalid memory address {0}")]
    InvalidMemoryAddress(i64),

    #[error("address alignment exception at {0}")]
    AddressAlignment(i64),

    #[error("compiler nesting")]
    CompilerNesting,

    #[error("name too long: {0}")]
    NameTooLong(String),

    #[error("attempt to use zero-length name")]
    ZeroLengthName,

    #[error("interpreting a compile-only word: {0}")]
    CompileOnly(String),

    #[error("undefined word: {0}")]
    UndefinedWord(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result out of range")]
    ResultOutOfRange,

    #[error("parsed string overflow")]
    ParsedStringOverflow,

    #[error("aborted")]
    Abort,

    #[error("{0}")]
    AbortQuote(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl ForthError {
    /// The ANS Forth THROW code for this error
    pub fn code(&self) -> i32 {
        match self {
            ForthError::Abort => -1,
            ForthError::AbortQuote(_) => -2,
            ForthError::StackOverflow(StackKind::Data) => -3,
            ForthError::StackUnderflow(StackKind::Data) => -4,
            ForthError::StackOverflow(StackKind::Return) => -5,
            ForthError::StackUnderflow(StackKind::Return) => -6,
            ForthError::DictionaryOverflow => -8,
            ForthError::InvalidMemoryAddress(_) => -9,
            ForthError::DivisionByZero => -10,
            ForthError::ResultOutOfRange => -11,
            ForthError::UndefinedWord(_) => -13,
            ForthError::CompileOnly(_) => -14,
            ForthError::ZeroLengthName => -16,
            ForthError::ParsedStringOverflow => -18,
            ForthError::NameTooLong(_) => -19,
            ForthError::CompilerNesting => -22,
            ForthError::AddressAlignment(_) => -23,
            ForthError::InvalidNumber(_) => -24,
            ForthError::Io(_) => -37,
            ForthError::StackOverflow(StackKind::Control) => -52,
            ForthError::StackUnderflow(StackKind::Control) => -22,
            ForthError::MemoryOverflow => -256,
        }
    }
}

impl From<std::io::Error> for ForthError {
    fn from(e: std::io::Error) -> Self {
        ForthError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_ans() {
        assert_eq!(ForthError::StackUnderflow(StackKind::Data).code(), -4);
        assert_eq!(ForthError::StackOverflow(StackKind::Return).code(), -5);
        assert_eq!(ForthError::UndefinedWord("foo".into()).code(), -13);
        assert_eq!(ForthError::DivisionByZero.code(), -10);
    }

    #[test]
    fn test_messages_name_the_stack() {
        let e = ForthError::StackUnderflow(StackKind::Return);
        assert_eq!(e.to_string(), "return stack underflow");
        let e = ForthError::UndefinedWord("frob".into());
        assert_eq!(e.to_string(), "undefined word: frob");
    }
}
