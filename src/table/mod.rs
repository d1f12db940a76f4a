// This module owns the instruction data model and the opcode dispatch table. An
// InstructionDef is one fully-normalized table entry: identity, encoding shape,
// primary opcode, optional secondary function code, disassembly template, and the
// semantic formula in both canonical (cache) and typed form. OpcodeTable partitions
// all definitions by primary opcode: an opcode without a function code binds
// directly to one instruction, an opcode with function codes becomes a nested table
// keyed by function code and carrying the encoding type that decides where the
// secondary key is read from. Collisions are build-fatal because they indicate a
// malformed instruction set. Both maps are BTreeMaps, so iteration and therefore
// generated output is ordered by construction.

//! Instruction definitions and the opcode dispatch table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{BuildError, BuildResult, GenSession};
use crate::decode;
use crate::expr::normalize::{normalize, parse_expr};
use crate::expr::{Expr, SExpr};

pub mod cache;
pub mod loader;

/// The fixed instruction-word layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingType {
    IType,
    RIType,
    JType,
    RType,
    SType,
    CFType,
}

impl FromStr for EncodingType {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        Ok(match s {
            "IType" => EncodingType::IType,
            "RIType" => EncodingType::RIType,
            "JType" => EncodingType::JType,
            "RType" => EncodingType::RType,
            "SType" => EncodingType::SType,
            "CFType" => EncodingType::CFType,
            other => return Err(BuildError::UnknownEncoding(other.to_string())),
        })
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingType::IType => "IType",
            EncodingType::RIType => "RIType",
            EncodingType::JType => "JType",
            EncodingType::RType => "RType",
            EncodingType::SType => "SType",
            EncodingType::CFType => "CFType",
        };
        f.write_str(name)
    }
}

/// One fully-loaded instruction definition.
///
/// Immutable once constructed; owned by the dispatch table for the duration
/// of a generation run. `canon` is kept alongside the typed tree so the cache
/// writes back exactly what normalization produced.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionDef {
    pub name: String,
    pub encoding: EncodingType,
    pub opcode: u8,
    pub funct: Option<u16>,
    pub disasm: String,
    pub canon: SExpr,
    pub semantic: Expr,
}

impl InstructionDef {
    /// Build a definition from its canonical parts.
    ///
    /// The formula is lifted into the typed tree here; an entirely unusable
    /// formula degrades to an empty body (logged and counted by the session)
    /// rather than failing the build.
    pub fn from_canon(
        name: String,
        encoding: EncodingType,
        opcode: u8,
        funct: Option<u16>,
        disasm: String,
        canon: SExpr,
        session: &mut GenSession,
    ) -> BuildResult<Self> {
        if opcode > 0x3f {
            return Err(BuildError::MalformedDefinition {
                name,
                reason: format!("opcode 0x{opcode:x} exceeds the 6-bit range"),
            });
        }
        let semantic = parse_expr(&canon, session).unwrap_or(Expr::Block(Vec::new()));
        Ok(Self {
            name,
            encoding,
            opcode,
            funct,
            disasm,
            canon,
            semantic,
        })
    }

    /// Normalize and lift one raw loader record.
    pub fn from_raw(raw: loader::RawDef, session: &mut GenSession) -> BuildResult<Self> {
        let encoding = raw.encoding.parse()?;
        let canon = normalize(&raw.eval);
        Self::from_canon(
            raw.name,
            encoding,
            raw.opcode,
            raw.funct,
            raw.disasm,
            canon,
            session,
        )
    }
}

/// What one primary opcode dispatches to.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcodeEntry {
    Leaf(InstructionDef),
    Table {
        encoding: EncodingType,
        map: BTreeMap<u16, InstructionDef>,
    },
}

/// The opcode dispatch table: write-once during building, read-only afterward.
#[derive(Debug, Default)]
pub struct OpcodeTable {
    entries: BTreeMap<u8, OpcodeEntry>,
}

impl OpcodeTable {
    /// Partition definitions by opcode and function code.
    pub fn build(defs: Vec<InstructionDef>) -> BuildResult<Self> {
        let mut table = OpcodeTable::default();
        for def in defs {
            table.insert(def)?;
        }
        Ok(table)
    }

    fn insert(&mut self, def: InstructionDef) -> BuildResult<()> {
        let opcode = def.opcode;
        match def.funct {
            None => match self.entries.get(&opcode) {
                None => {
                    self.entries.insert(opcode, OpcodeEntry::Leaf(def));
                    Ok(())
                }
                Some(existing) => Err(BuildError::DuplicateOpcode {
                    opcode,
                    existing: existing.describe(),
                    name: def.name,
                }),
            },
            Some(funct) => {
                let entry = self.entries.entry(opcode).or_insert_with(|| {
                    OpcodeEntry::Table {
                        encoding: def.encoding,
                        map: BTreeMap::new(),
                    }
                });
                match entry {
                    OpcodeEntry::Leaf(existing) => Err(BuildError::DuplicateOpcode {
                        opcode,
                        existing: existing.name.clone(),
                        name: def.name,
                    }),
                    OpcodeEntry::Table { encoding, map } => {
                        if decode::key_location(*encoding) != decode::key_location(def.encoding) {
                            return Err(BuildError::MixedDispatch { opcode });
                        }
                        if let Some(existing) = map.get(&funct) {
                            return Err(BuildError::DuplicateFunction {
                                opcode,
                                funct,
                                existing: existing.name.clone(),
                                name: def.name,
                            });
                        }
                        map.insert(funct, def);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Entries in ascending opcode order.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &OpcodeEntry)> {
        self.entries.iter().map(|(op, entry)| (*op, entry))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OpcodeEntry {
    fn describe(&self) -> String {
        match self {
            OpcodeEntry::Leaf(def) => def.name.clone(),
            OpcodeEntry::Table { .. } => "a function-code table".to_string(),
        }
    }
}
