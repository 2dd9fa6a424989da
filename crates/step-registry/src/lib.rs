pub use probe_core;

mod args;
mod pattern;
mod registry;

pub use args::{Param, StepArgs, StepLine, Table};
pub use pattern::{ParamKind, StepPattern};
pub use registry::{Resolved, StepFn, StepFuture, StepRegistry};

// Re-export core types for convenience
pub use probe_core::{HarnessError, Result};
