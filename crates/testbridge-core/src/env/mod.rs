//! Bridging between static `define` replacements and runtime-mutable state.

mod bridge;
mod globals;
mod store;

pub use bridge::{
    backfill_standard_env, bridge_defines, classify, define_target, env_string, BridgeReport,
    DefineTable, DefineTarget, DefineValue, MODULE_ENV_PREFIX,
};
pub use globals::GlobalBindings;
pub use store::{EnvStore, MemoryEnv, ProcessEnv};
