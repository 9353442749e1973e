//! Jack-to-VM compiler library.

pub mod compiler;
pub mod emitter;
pub mod symbol_table;
pub mod token;

pub use compiler::compile;
pub use n2t_diagnostics::{Error, Result};
