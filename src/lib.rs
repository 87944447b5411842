//! A small page-oriented SQL storage engine: slotted pages and heap files at
//! the bottom, a unique B-tree secondary index and a self-describing
//! catalog above that, a tiny relational algebra and SQL front end tying it
//! together, all driven by a line-oriented REPL.

pub mod btree;
pub mod catalog;
pub mod constants;
pub mod env;
pub mod error;
pub mod exec;
pub mod io;
pub mod plan;
pub mod sql;
pub mod storage;
pub mod value;
