// This module defines error types for the decompgen build pipeline using the thiserror
// crate for idiomatic Rust error handling. BuildError is the main error enum covering
// the build-fatal conditions: opcode and function-code collisions in the dispatch
// table, unknown encoding-type names at the loader boundary, structurally malformed
// instruction definitions, and I/O or format failures. Each variant carries the
// context needed to identify the offending table entry (instruction names, opcode and
// function-code values). The module also provides BuildResult<T> as a convenience
// alias. Recoverable conditions (an unrecognized semantic operator in a definition)
// are not errors; they go through the log facade and the session drop counter instead.

//! Error types for the generator.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Main error type for table compilation.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("opcode 0x{opcode:02x} is already bound to {existing} (while inserting {name})")]
    DuplicateOpcode {
        opcode: u8,
        existing: String,
        name: String,
    },

    #[error(
        "function code 0x{funct:02x} under opcode 0x{opcode:02x} is already bound to {existing} \
         (while inserting {name})"
    )]
    DuplicateFunction {
        opcode: u8,
        funct: u16,
        existing: String,
        name: String,
    },

    #[error("opcode 0x{opcode:02x} mixes encoding types with different function-code fields")]
    MixedDispatch { opcode: u8 },

    #[error("unknown encoding type: {0}")]
    UnknownEncoding(String),

    #[error("malformed definition for {name}: {reason}")]
    MalformedDefinition { name: String, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;
