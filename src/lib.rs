//! decompgen - instruction-table to dynarec-source compiler.
//!
//! decompgen compiles a declarative MIPS R3000 instruction table into a C
//! source file. The generated `decompile()` function decodes a raw 32-bit
//! instruction word through an opcode/function dispatch tree and emits, per
//! instruction, the libjit calls that reproduce its runtime semantics.
//!
//! # Primary Usage
//!
//! ```no_run
//! use decompgen::codegen::assemble_artifact;
//! use decompgen::core::GenSession;
//! use decompgen::table::{loader, InstructionDef, OpcodeTable};
//!
//! # fn main() -> decompgen::core::BuildResult<()> {
//! let mut session = GenSession::new();
//! let raws = loader::read_table("insts.json".as_ref())?;
//! let defs = raws
//!     .into_iter()
//!     .map(|raw| InstructionDef::from_raw(raw, &mut session))
//!     .collect::<decompgen::core::BuildResult<Vec<_>>>()?;
//! let table = OpcodeTable::build(defs)?;
//! let source = assemble_artifact(&table, "/* runtime stub */", &mut session);
//! # let _ = source;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`expr`] - canonical/typed expression trees, normalization, free variables
//! - [`table`] - instruction definitions, dispatch table, loader boundary, cache
//! - [`decode`] - per-encoding field layouts and dependency-driven extraction
//! - [`lower`] - semantic formula -> intermediate statement sequence
//! - [`render`] - dual-backend rendering (literal source / JIT emission calls)
//! - [`codegen`] - dispatch-tree construction and artifact assembly
//! - [`core`] - shared infrastructure (errors, session)

pub mod codegen;
pub mod core;
pub mod decode;
pub mod expr;
pub mod lower;
pub mod render;
pub mod table;

// Re-export common types
pub use crate::core::{BuildError, BuildResult, GenSession, GenStats};
pub use crate::expr::{Expr, OpKind, SExpr};
pub use crate::table::{EncodingType, InstructionDef, OpcodeTable};
