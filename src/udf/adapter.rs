// In: src/udf/adapter.rs

use crate::error::{BridgeError, Result};
use crate::marshal::{Row, ScalarValue};
use crate::udf::{UdfDefinition, UdfOperator};

/// The session's single handle on the user operator.
///
/// Each call is forwarded once, with no retries. Whatever the operator raises comes
/// back as `BridgeError::UserFunction` tagged with the lifecycle stage.
pub struct LifecycleAdapter {
    operator: Box<dyn UdfOperator>,
}

impl LifecycleAdapter {
    pub fn new(definition: UdfDefinition) -> Self {
        log::debug!("resolving user function from {}", definition.kind());
        Self {
            operator: definition.into_operator(),
        }
    }

    pub fn open(&mut self, args: &[ScalarValue]) -> Result<()> {
        self.operator
            .open(args)
            .map_err(|e| BridgeError::user_function("open", e))
    }

    pub fn accept(&mut self, row: Row) -> Result<()> {
        self.operator
            .accept(row)
            .map_err(|e| BridgeError::user_function("accept", e))
    }

    pub fn has_next(&mut self) -> Result<bool> {
        self.operator
            .has_next()
            .map_err(|e| BridgeError::user_function("has_next", e))
    }

    pub fn next(&mut self) -> Result<Row> {
        self.operator
            .next()
            .map_err(|e| BridgeError::user_function("next", e))
    }

    pub fn input_exhausted(&mut self) -> Result<()> {
        self.operator
            .input_exhausted()
            .map_err(|e| BridgeError::user_function("input_exhausted", e))
    }

    pub fn close(&mut self) -> Result<()> {
        self.operator
            .close()
            .map_err(|e| BridgeError::user_function("close", e))
    }

    /// Pulls every pending output row, in the order the operator yields them.
    pub fn drain(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while self.has_next()? {
            rows.push(self.next()?);
        }
        Ok(rows)
    }
}

impl From<UdfDefinition> for LifecycleAdapter {
    fn from(definition: UdfDefinition) -> Self {
        LifecycleAdapter::new(definition)
    }
}

impl std::fmt::Debug for LifecycleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleAdapter").finish_non_exhaustive()
    }
}
