//! # GST Core
//!
//! Compliance engine for Indian GST: classifies inventory into HSN/SAC codes,
//! splits tax into CGST/SGST/IGST, builds GSTR-1 and GSTR-3B returns,
//! reconciles purchases against supplier-reported GSTR-2A data and issues
//! e-way bills. Every state change is written to an append-only audit trail.
//!
//! ## Features
//!
//! - **GSTIN checks**: format validation, state codes, inter-state detection
//! - **Tax calculation**: rate splits, reverse charge, input tax credit
//! - **Classification**: ordered rule registry, auto-mapping, code suggestions
//! - **Returns**: GSTR-1 schedules, GSTR-3B liability, filing lifecycle
//! - **Reconciliation**: books vs GSTR-2A discrepancies and financial impact
//! - **E-way bills**: eligibility, issuance and cancellation
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use gst_core::{calculate, GstCompliance, GstConfig, MemoryStorage};
//! use bigdecimal::BigDecimal;
//!
//! let split = calculate(&BigDecimal::from(10000), &BigDecimal::from(18), false);
//! assert_eq!(split.cgst, BigDecimal::from(900));
//! assert_eq!(split.sgst, BigDecimal::from(900));
//!
//! let engine = GstCompliance::new(MemoryStorage::new(), GstConfig::default()).unwrap();
//! let classification = engine.classify(Some("tropical"), "Mango Cooler", Some("tropical"));
//! assert_eq!(classification.code, "2009");
//! ```

pub mod audit;
pub mod classification;
pub mod compliance;
pub mod config;
pub mod eway;
pub mod reconciliation;
pub mod returns;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use compliance::GstCompliance;
pub use config::{GstConfig, RefilingPolicy, SeverityThresholds};
pub use tax::gst::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;
pub use utils::progress::{BatchControl, CancellationToken, Progress};
