// This module is the crate's interface to the external table-description
// interpreter. The interpreter itself (the description-language front end) is a
// separate tool; what reaches us is its structured dump: one record per derived
// instruction carrying the name, encoding-type name, opcode, optional function
// code, disassembly template and the raw semantic definition tree. Records are
// deserialized with serde from a JSON document, which keeps the boundary
// inspectable and lets the interpreter evolve independently of the generator.

//! Raw instruction records from the external table interpreter.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::BuildResult;
use crate::expr::normalize::DefNode;

/// One instruction record as dumped by the table interpreter.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDef {
    pub name: String,
    pub encoding: String,
    pub opcode: u8,
    #[serde(default)]
    pub funct: Option<u16>,
    pub disasm: String,
    pub eval: DefNode,
}

/// Read the interpreter's record dump.
pub fn read_table(path: &Path) -> BuildResult<Vec<RawDef>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
