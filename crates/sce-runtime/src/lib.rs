pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod host;
pub mod manager;
pub mod reader;
mod rng;
pub mod runner;
pub mod variables;
pub mod waiter;

pub use decoder::{decode, decode_all, decode_header, decode_next, CommandHeader};
pub use descriptor::{op, CommandDescriptor, DescriptorTable, InstructionSet, ParamKind};
pub use encoder::{build_command, encode, encode_script, encoded_len, ByteWriter};
pub use host::{
    CommandPatchTable, CommandPatcher, CommandSink, DefaultGameState, DiscardingSink,
    DispatchContext, GameStateQuery, NoCommandPatches, PatchContext, RunnerHost, ScriptRequests,
};
pub use manager::{ScriptManager, ScriptManagerOptions, PREEMPT_PASS_DELTA_TIME};
pub use reader::ByteReader;
pub use rng::ScriptRng;
pub use runner::{RunnerState, ScriptRunner};
pub use variables::{GlobalVariables, SharedGlobals, SharedRng, VariableStore};
pub use waiter::{CancelHandle, CancelableWaiter, TimedWaiter, Waiter};
