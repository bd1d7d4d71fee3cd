//! # panier-export: Shopping List PDF Export
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ListSnapshot { store, date, lines }                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pdf::render ──► A4 PDF bytes                                          │
//! │       │           ┌──────────────────────────────────────────┐         │
//! │       │           │          Liste de courses                │         │
//! │       │           │ Magasin: Lidl                            │         │
//! │       │           │ Date: 14/03/2024                         │         │
//! │       │           │ Produit     Prix unitaire Quantité Total │         │
//! │       │           │ ──────────────────────────────────────── │         │
//! │       │           │ Pain             1,20 EUR        2 2,40… │         │
//! │       │           │                        Total: 2,40 EUR   │         │
//! │       │           └──────────────────────────────────────────┘         │
//! │       ▼                                                                 │
//! │  write_to_dir ──► liste-courses-<store>-<YYYY-MM-DD>.pdf               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod pdf;
pub mod snapshot;

pub use error::{ExportError, ExportResult};
pub use pdf::{render, write_to_dir};
pub use snapshot::{file_name, ExportLine, ListSnapshot};
