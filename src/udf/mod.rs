// In: src/udf/mod.rs

//! The user-function boundary.
//!
//! A user operator is anything implementing `UdfOperator`. The bootstrap step hands
//! the server a `UdfDefinition`, which is resolved exactly once into a
//! `LifecycleAdapter`; from then on the session only ever talks to the adapter.

pub mod adapter;
pub mod operators;

pub use adapter::LifecycleAdapter;
pub use operators::{FilterOperator, MapOperator};

use crate::error::UdfError;
use crate::marshal::{Row, ScalarValue};

/// The lifecycle contract every user operator fulfils.
///
/// Output is pulled, not pushed: after `accept` or `input_exhausted` the session
/// drains the operator with `has_next`/`next` until it reports no more rows.
pub trait UdfOperator: Send {
    fn open(&mut self, args: &[ScalarValue]) -> Result<(), UdfError>;

    fn accept(&mut self, row: Row) -> Result<(), UdfError>;

    fn has_next(&mut self) -> Result<bool, UdfError>;

    fn next(&mut self) -> Result<Row, UdfError>;

    /// Called once when the caller has no more input to send.
    fn input_exhausted(&mut self) -> Result<(), UdfError>;

    fn close(&mut self) -> Result<(), UdfError>;
}

/// A row-to-row transform.
pub type MapFn = Box<dyn FnMut(Row) -> Result<Row, UdfError> + Send>;

/// A row predicate; rows for which it returns `true` are kept.
pub type FilterFn = Box<dyn FnMut(&Row) -> Result<bool, UdfError> + Send>;

/// The three shapes a user function can be supplied in.
pub enum UdfDefinition {
    /// A ready-made operator instance.
    Operator(Box<dyn UdfOperator>),
    /// A `map_function` hook, wrapped into a `MapOperator`.
    Map(MapFn),
    /// A `filter_function` hook, wrapped into a `FilterOperator`.
    Filter(FilterFn),
}

impl UdfDefinition {
    pub fn operator(op: impl UdfOperator + 'static) -> Self {
        UdfDefinition::Operator(Box::new(op))
    }

    pub fn map<F>(f: F) -> Self
    where
        F: FnMut(Row) -> Result<Row, UdfError> + Send + 'static,
    {
        UdfDefinition::Map(Box::new(f))
    }

    pub fn filter<F>(f: F) -> Self
    where
        F: FnMut(&Row) -> Result<bool, UdfError> + Send + 'static,
    {
        UdfDefinition::Filter(Box::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UdfDefinition::Operator(_) => "operator",
            UdfDefinition::Map(_) => "map_function",
            UdfDefinition::Filter(_) => "filter_function",
        }
    }

    /// Resolves the definition into the single polymorphic operator the session drives.
    pub fn into_operator(self) -> Box<dyn UdfOperator> {
        match self {
            UdfDefinition::Operator(op) => op,
            UdfDefinition::Map(f) => Box::new(MapOperator::new(f)),
            UdfDefinition::Filter(f) => Box::new(FilterOperator::new(f)),
        }
    }
}

impl std::fmt::Debug for UdfDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UdfDefinition").field(&self.kind()).finish()
    }
}
