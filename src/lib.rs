//! Export pipeline for event contribution records: Moi gifts, material
//! donations and income/expense entries fetched from the bookkeeping
//! backend, assembled into totalled tables and rendered as workbooks,
//! documents or CSV sheets.

pub mod columns;
pub mod config;
pub mod document;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod session;
pub mod tamil;
pub mod translate;
pub mod types;
pub mod util;

pub use error::{ExportError, Result};
