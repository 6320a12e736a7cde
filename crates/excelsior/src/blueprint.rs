//! `excelsior blueprint`: the strategic-refactor subsystem described in
//! `spec.md` §6 lives outside this engine's scope (it consumes
//! `BLUEPRINT.md`, never produces it here). The command exists so the CLI
//! surface matches the spec exactly; it reports its own absence instead of
//! silently doing nothing.

use anyhow::{bail, Result};

use crate::cli::{BlueprintCommand, BlueprintSource};

pub fn run(cmd: &BlueprintCommand) -> Result<()> {
    let source = match cmd.source {
        BlueprintSource::Check => ".excelsior/check",
        BlueprintSource::Health => ".excelsior/health",
    };
    bail!(
        "blueprint generation from {source} is not implemented by this engine; \
         it is produced by a separate strategic-refactor tool that consumes \
         this engine's audit trail"
    );
}
