//! Output-script classification and disassembly.

pub mod disasm;
pub mod opcodes;
pub mod standard;

pub use disasm::disassemble;
pub use standard::{classify, ScriptClass, ScriptType};
