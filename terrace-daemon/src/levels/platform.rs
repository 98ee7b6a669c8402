//! Level 4 "platform": extension modules.
//!
//! Registers [`Module`](terrace_core::Module) implementors; their
//! `configure` hooks run during this level's configure pass and can
//! register further components into the scope (late-bound wiring).

use terrace_core::error::TerraceError;
use terrace_core::{Level, LevelDef};

use crate::components::TelemetryModule;

/// Definition of the topmost persistent level.
pub struct PlatformDef;

impl LevelDef for PlatformDef {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
        level.add(TelemetryModule)?;
        Ok(())
    }
}
