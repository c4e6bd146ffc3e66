//! Table-level parsing layer for OP2 containers.
//!
//! This module sits between the record framing in
//! [`framing`](crate::op2::framing) and the session loop in
//! [`reader`](crate::op2::reader).
//!
//! # Module Organization
//!
//! - [`header`]: The file header and version block
//! - [`classify`]: Static table-name sets and family classification
//! - [`tables`]: Geometry/result table framing and the handler interface
//! - [`matrix`]: The generic matrix decoder
//! - [`special`]: Tables with one-off layouts
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌─────────────────┐
//! │  Header         │ ← header::parse()
//! ├─────────────────┤
//! │  Table          │ ← classify::Classifier, then one of
//! │  Table          │   tables::read_table(), matrix::read(),
//! │  ...            │   special::read()
//! ├─────────────────┤
//! │  [0]            │ end of tables
//! └─────────────────┘
//! ```

pub mod classify;
pub mod header;
pub mod matrix;
pub mod special;
pub mod tables;
