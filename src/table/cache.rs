// This module persists the normalized instruction set between runs so the (slow)
// external interpreter only has to be consulted when the source table actually
// changed. The cache is a JSON array of (name, encoding, opcode, functionCode or
// null, disasm, canonicalExpression) tuples; the canonical expression serializes
// untagged, so the file stays a plain nested-array document. Staleness is a
// filesystem mtime comparison: a missing or unreadable cache, or a source table
// newer than the cache, forces regeneration. Loading the cache reproduces the same
// InstructionDef set as re-normalizing the source, which the round-trip test pins.

//! On-disk cache of the normalized instruction set.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{BuildResult, GenSession};
use crate::expr::SExpr;
use crate::table::{EncodingType, InstructionDef};

/// One cached instruction tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry(
    pub String,
    pub EncodingType,
    pub u8,
    pub Option<u16>,
    pub String,
    pub SExpr,
);

impl CacheEntry {
    pub fn from_def(def: &InstructionDef) -> Self {
        CacheEntry(
            def.name.clone(),
            def.encoding,
            def.opcode,
            def.funct,
            def.disasm.clone(),
            def.canon.clone(),
        )
    }

    pub fn into_def(self, session: &mut GenSession) -> BuildResult<InstructionDef> {
        let CacheEntry(name, encoding, opcode, funct, disasm, canon) = self;
        InstructionDef::from_canon(name, encoding, opcode, funct, disasm, canon, session)
    }
}

/// Whether the cache must be regenerated from the source table.
pub fn is_stale(table: &Path, cache: &Path) -> bool {
    let cache_mtime = match fs::metadata(cache).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return true,
    };
    match fs::metadata(table).and_then(|m| m.modified()) {
        Ok(table_mtime) => table_mtime > cache_mtime,
        Err(_) => true,
    }
}

pub fn load(path: &Path) -> BuildResult<Vec<CacheEntry>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn store(path: &Path, defs: &[InstructionDef]) -> BuildResult<()> {
    let entries: Vec<CacheEntry> = defs.iter().map(CacheEntry::from_def).collect();
    fs::write(path, serde_json::to_string(&entries)?)?;
    Ok(())
}
