//! Cursor (seek) pagination.
//!
//! A listing is ordered by one whitelisted column plus the row id as a
//! tie-break, and continues from an opaque cursor carrying the last row's
//! `(sort_field, sort_value, id)` plus a fingerprint of the direction and
//! filters it was minted under.

mod cursor;
mod planner;
mod sort;

pub use cursor::{decode, encode, CursorData};
pub use planner::{
    cursor_scope, finish_page, plan, Filters, Page, PagePlan, SeekPredicate, Seekable, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use sort::{format, parse, SortField, SortOrder, SortValue};
