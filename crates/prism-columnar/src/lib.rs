//! Immutable columnar tables for the prism sketch engine.
//!
//! This crate focuses on:
//! - Typed column storage shared between table versions (`Arc`-backed buffers).
//! - Membership sets that record which physical rows are logically present, so filtering and
//!   sampling never copy column data.
//! - Compaction (`compress`) into a dense row space when a physical copy is actually wanted.

#![forbid(unsafe_code)]

mod bitmap;
mod column;
mod error;
mod membership;
mod schema;
mod table;
mod types;

pub use crate::bitmap::{BitVec, IterOnes};
pub use crate::column::{Column, ColumnBuilder, ColumnData};
pub use crate::error::{Result, TableError};
pub use crate::membership::{MembershipIter, MembershipKind, MembershipSet, RowOrder};
pub use crate::schema::{ColumnDescription, Schema, SubSchema};
pub use crate::table::{Table, TableBuilder, MAX_DUMP_ROWS};
pub use crate::types::{ColumnKind, Value};
