// In: src/marshal/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Row Marshaller
// ====================================================================================
//
// User operators see one record at a time, while everything staged in the batch
// store is columnar. This module is the only place the two meet.
//
//   [Batch Store] --RecordBatch--> to_rows() --Vec<Row>--> operator.accept(row)
//
//   operator.next() --Vec<Row>--> from_rows() --RecordBatch--> [Batch Store]
//
// `column_to_scalars` is exposed separately because the session also reads
// single-column scalar lists (the `conf` and `args` channels).
// ====================================================================================
pub(crate) mod arrow_impl;
pub mod row;

pub use arrow_impl::{column_to_scalars, from_rows, to_rows};
pub use row::{Row, ScalarValue};
