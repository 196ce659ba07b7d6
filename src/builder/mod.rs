//! Native build orchestration.
//!
//! [`BuildContext`] holds the resolved configuration of one module,
//! [`CompileOrchestrator`] turns it into [`CompileTask`]s and a
//! [`CompileEngine`] runs them against a [`Toolchain`].

pub mod compile;
pub mod context;
pub mod engine;
pub mod task;
pub mod toolchain;

pub use compile::{CompileOrchestrator, CompileReport};
pub use context::{BuildContext, BuildOptions};
pub use engine::{CompileEngine, NativeEngine, TaskOutcome};
pub use task::{BuildMode, CompileTask, LibSet, SourceSet};
pub use toolchain::{toolchain_for, CommandSpec, GccToolchain, MsvcToolchain, Toolchain};
