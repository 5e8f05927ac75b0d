//! Infrastructure layer

pub mod command;

pub use command::{CommandError, CommandRunner};
