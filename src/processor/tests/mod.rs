//! Pipeline tests
//!
//! Exercise the complete load against spreadsheet fixtures written to a
//! temporary export tree and an in-memory database.
