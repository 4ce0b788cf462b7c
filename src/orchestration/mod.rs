//! # Sync Orchestration
//!
//! Ordered-step execution for the import flows plus the paginated bridge scans.
//!
//! ## Core Components
//!
//! - **Orchestrator**: Runs an explicit sequence of steps against a typed
//!   context, halting on the first failure
//! - **SyncStep**: One unit of pipeline work, generic over its context so
//!   each flow carries exactly the state its steps exchange
//! - **ScanPager**: Walks a bridge dataset page by page from a caller-owned
//!   cursor and publishes one update message per distinct identifier
//!
//! Handlers assemble pipelines from concrete steps; the orchestration layer
//! stays generic over what each step does.

pub mod context;
pub mod orchestrator;
pub mod scan;
pub mod step;

pub use context::{HoldingImportContext, PartyImportContext, ScanContext};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use scan::{HoldingScan, PagedScan, PartyScan, ScanCursor, ScanPager, ScanStats};
pub use step::SyncStep;
