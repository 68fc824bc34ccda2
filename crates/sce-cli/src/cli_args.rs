use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sce_core::ScriptType;

pub(crate) const DEFAULT_DELTA_TIME: f32 = 1.0 / 30.0;
pub(crate) const DEFAULT_MAX_TICKS: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "sce-cli")]
#[command(about = "Run, disassemble and check SCE script packs")]
pub(crate) struct Cli {
    /// Tracing filter such as `debug` or `sce_runtime=trace`. Overrides RUST_LOG.
    #[arg(long = "log-level", global = true)]
    pub(crate) log_level: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Run one script to completion and print dispatches and events as JSON lines.
    Run(RunArgs),
    /// Print the decoded commands of one script.
    Disasm(DisasmArgs),
    /// Run every `*.case.json` against its sibling `pack.json`.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ScriptTypeArg {
    System,
    WorldMap,
    Scene,
}

impl From<ScriptTypeArg> for ScriptType {
    fn from(value: ScriptTypeArg) -> Self {
        match value {
            ScriptTypeArg::System => ScriptType::System,
            ScriptTypeArg::WorldMap => ScriptType::WorldMap,
            ScriptTypeArg::Scene => ScriptType::Scene,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "pack")]
    pub(crate) pack: PathBuf,
    #[arg(long = "script")]
    pub(crate) script: u32,
    #[arg(long = "script-type", value_enum, default_value_t = ScriptTypeArg::System)]
    pub(crate) script_type: ScriptTypeArg,
    #[arg(long = "delta-time", default_value_t = DEFAULT_DELTA_TIME)]
    pub(crate) delta_time: f32,
    #[arg(long = "max-ticks", default_value_t = DEFAULT_MAX_TICKS)]
    pub(crate) max_ticks: usize,
    /// Write the final global variables here.
    #[arg(long = "save-out")]
    pub(crate) save_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub(crate) struct DisasmArgs {
    #[arg(long = "pack")]
    pub(crate) pack: PathBuf,
    #[arg(long = "script")]
    pub(crate) script: u32,
    #[arg(long = "script-type", value_enum, default_value_t = ScriptTypeArg::System)]
    pub(crate) script_type: ScriptTypeArg,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "cases-dir")]
    pub(crate) cases_dir: PathBuf,
}
