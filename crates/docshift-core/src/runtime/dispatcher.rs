use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::runtime::progress::ProgressSink;
use crate::runtime::types::DispatchError;
use crate::services::{ConversionJob, ConversionOperation, Programs, Tool, default_operations};

/// Fixed table from [`Tool`] to the operation implementing it.
///
/// The dispatcher only resolves names and forwards the progress sink; how a
/// conversion works is entirely up to the operation.
#[derive(Clone)]
pub struct Dispatcher {
    operations: Arc<HashMap<Tool, Arc<dyn ConversionOperation>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tools = self.tools();
        tools.sort();
        f.debug_struct("Dispatcher").field("tools", &tools).finish()
    }
}

impl Dispatcher {
    /// A dispatcher with no operations; every tool is unsupported.
    pub fn empty() -> Self {
        Self {
            operations: Arc::new(HashMap::new()),
        }
    }

    /// A dispatcher with the default external-program operations.
    pub fn with_programs(programs: &Programs) -> Self {
        Self {
            operations: Arc::new(default_operations(programs)),
        }
    }

    /// Install (or replace) the operation for `tool`.
    pub fn register(mut self, tool: Tool, operation: Arc<dyn ConversionOperation>) -> Self {
        Arc::make_mut(&mut self.operations).insert(tool, operation);
        self
    }

    /// Tools that currently have an operation.
    pub fn tools(&self) -> Vec<Tool> {
        self.operations.keys().copied().collect()
    }

    /// Resolve a client-supplied tool name.
    pub fn resolve(&self, tool_name: &str) -> Result<Arc<dyn ConversionOperation>, DispatchError> {
        tool_name
            .parse::<Tool>()
            .ok()
            .and_then(|tool| self.operations.get(&tool).cloned())
            .ok_or_else(|| DispatchError::UnsupportedTool(tool_name.to_owned()))
    }

    /// Run the operation for `tool_name` on the calling (blocking) thread.
    pub fn dispatch(
        &self,
        tool_name: &str,
        job: &ConversionJob,
        progress: &ProgressSink,
    ) -> Result<Vec<PathBuf>, DispatchError> {
        let operation = self.resolve(tool_name)?;
        debug!(task_id = %progress.task_id(), tool = %tool_name, inputs = job.inputs.len(), "dispatching conversion");
        Ok(operation.run(job, progress)?)
    }
}
