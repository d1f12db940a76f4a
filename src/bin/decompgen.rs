//! Generator driver binary.
//!
//! Loads the instruction table (or its cache when still fresh), builds the
//! dispatch table, and writes the assembled artifact. All fatal conditions
//! surface as a rendered [`BuildError`]; drop-and-continue diagnostics are
//! summarized at the end of the run.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use decompgen::codegen::assemble_artifact;
use decompgen::core::{BuildResult, GenSession};
use decompgen::table::{cache, loader, InstructionDef, OpcodeTable};

#[derive(Debug, Parser)]
#[command(version, about = "Compile an instruction table into dynarec source")]
struct Args {
    /// Instruction table dump produced by the description interpreter.
    table: PathBuf,

    /// Cache of the normalized table; regenerated when the table is newer.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Runtime stub prepended verbatim to the generated file.
    #[arg(long)]
    stub: PathBuf,

    /// Path of the generated source file.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> BuildResult<()> {
    let mut session = GenSession::new();

    let defs = load_defs(args, &mut session)?;
    let table = OpcodeTable::build(defs)?;
    if table.is_empty() {
        log::warn!("instruction table is empty; the artifact will decode nothing");
    }

    let stub = fs::read_to_string(&args.stub)?;
    let artifact = assemble_artifact(&table, &stub, &mut session);
    fs::write(&args.output, artifact)?;

    let stats = session.stats();
    log::info!(
        "generated {} instruction(s) into {}",
        stats.instructions,
        args.output.display()
    );
    if stats.dropped_nodes > 0 {
        log::warn!(
            "{} semantic node(s) were dropped during this run; the affected instructions \
             compiled with incomplete semantics",
            stats.dropped_nodes
        );
    }
    Ok(())
}

/// Load definitions from the cache when fresh, else re-normalize the table.
fn load_defs(args: &Args, session: &mut GenSession) -> BuildResult<Vec<InstructionDef>> {
    if let Some(cache_path) = &args.cache {
        if !cache::is_stale(&args.table, cache_path) {
            log::debug!("loading cached instruction set from {}", cache_path.display());
            return cache::load(cache_path)?
                .into_iter()
                .map(|entry| entry.into_def(session))
                .collect();
        }
    }

    log::info!("rebuilding from tables");
    let raws = loader::read_table(&args.table)?;
    let defs = raws
        .into_iter()
        .map(|raw| InstructionDef::from_raw(raw, session))
        .collect::<BuildResult<Vec<_>>>()?;

    if let Some(cache_path) = &args.cache {
        cache::store(cache_path, &defs)?;
    }
    Ok(defs)
}
