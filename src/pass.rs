//! Graph analysis and rewrite passes.

use std::error::Error;
use std::fmt;

use crate::graph::Function;

mod common_subexpr;
mod eliminate_identity;
mod liveness;
mod shape_check;

pub use common_subexpr::EliminateCommonSubexpr;
pub use eliminate_identity::EliminateIdentity;
pub use liveness::Liveness;
pub use shape_check::ShapeCheck;

/// Failure of a single pass, identified by the pass's name.
#[derive(Clone, Debug, PartialEq)]
pub struct PassError {
    pass: String,
    message: String,
}

impl PassError {
    pub fn new(pass: &str, message: impl Into<String>) -> PassError {
        PassError {
            pass: pass.to_string(),
            message: message.into(),
        }
    }

    /// Name of the pass that failed.
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass \"{}\" failed: {}", self.pass, self.message)
    }
}

impl Error for PassError {}

/// A single graph analysis or transformation.
///
/// A pass may add or update derived annotations (eg. liveness) or rewrite
/// graph structure by creating replacement nodes and rewiring consumers via
/// [`Function::replace_uses`]. It must leave the graph a DAG on return; the
/// manager re-validates after each pass and fails the pipeline if not.
pub trait Pass {
    /// Name reported when this pass fails.
    fn name(&self) -> &str;

    /// Run the pass over `function`.
    fn run(&self, function: &mut Function) -> Result<(), PassError>;
}

/// An ordered pipeline of passes.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> PassManager {
        PassManager { passes: Vec::new() }
    }

    /// Append a pass to the pipeline.
    pub fn register_pass<P: Pass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Run each registered pass over `function`, in registration order,
    /// exactly once.
    ///
    /// Fails fast: the first pass failure aborts the pipeline, and the
    /// function is left exactly as the last successful pass left it. No
    /// rollback is attempted.
    pub fn run_passes(&self, function: &mut Function) -> Result<(), PassError> {
        for pass in &self.passes {
            pass.run(function)?;
            if let Err(err) = function.validate() {
                return Err(PassError::new(pass.name(), err.to_string()));
            }
        }
        Ok(())
    }
}
