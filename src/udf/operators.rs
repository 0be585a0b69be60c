// In: src/udf/operators.rs

//! Generic operators built around the plain function hooks.

use std::collections::VecDeque;

use crate::error::UdfError;
use crate::marshal::{Row, ScalarValue};
use crate::udf::{FilterFn, MapFn, UdfOperator};

/// Applies a map function to every accepted row and queues the result.
pub struct MapOperator {
    func: MapFn,
    pending: VecDeque<Row>,
}

impl MapOperator {
    pub fn new(func: MapFn) -> Self {
        Self {
            func,
            pending: VecDeque::new(),
        }
    }
}

impl UdfOperator for MapOperator {
    fn open(&mut self, _args: &[ScalarValue]) -> Result<(), UdfError> {
        Ok(())
    }

    fn accept(&mut self, row: Row) -> Result<(), UdfError> {
        let mapped = (self.func)(row)?;
        self.pending.push_back(mapped);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, UdfError> {
        Ok(!self.pending.is_empty())
    }

    fn next(&mut self) -> Result<Row, UdfError> {
        self.pending
            .pop_front()
            .ok_or_else(|| "next() called on a drained map operator".into())
    }

    fn input_exhausted(&mut self) -> Result<(), UdfError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), UdfError> {
        self.pending.clear();
        Ok(())
    }
}

/// Queues every accepted row its predicate keeps.
pub struct FilterOperator {
    predicate: FilterFn,
    pending: VecDeque<Row>,
}

impl FilterOperator {
    pub fn new(predicate: FilterFn) -> Self {
        Self {
            predicate,
            pending: VecDeque::new(),
        }
    }
}

impl UdfOperator for FilterOperator {
    fn open(&mut self, _args: &[ScalarValue]) -> Result<(), UdfError> {
        Ok(())
    }

    fn accept(&mut self, row: Row) -> Result<(), UdfError> {
        if (self.predicate)(&row)? {
            self.pending.push_back(row);
        }
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, UdfError> {
        Ok(!self.pending.is_empty())
    }

    fn next(&mut self) -> Result<Row, UdfError> {
        self.pending
            .pop_front()
            .ok_or_else(|| "next() called on a drained filter operator".into())
    }

    fn input_exhausted(&mut self) -> Result<(), UdfError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), UdfError> {
        self.pending.clear();
        Ok(())
    }
}
