pub mod builtin;
pub mod compiler;
pub mod console;
pub mod control;
pub mod debug;
pub mod dictionary;
pub mod files;
pub mod general;
pub mod inner;
pub mod messages;
pub mod number;
pub mod stack;
pub mod tui;
