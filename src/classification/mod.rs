//! HSN/SAC classification of inventory products

pub mod analyzer;
pub mod codes;
pub mod mapper;
pub mod registry;

pub use analyzer::{AnalysisReport, CatalogEntry, CodeTableCatalog, InventoryAnalyzer};
pub use codes::{validate_code, TaxCodeService};
pub use mapper::{AutoMapOutcome, CodeAssignment, HsnMapper, MappingExport, MappingReport, MappingStats};
pub use registry::{Classification, CodeRegistry, Condition, Field, RegistryConfig};
