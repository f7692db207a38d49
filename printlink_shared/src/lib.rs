// printlink_shared: vendor-neutral engine shared by every printer adapter

pub mod command_map;
pub mod correlator;
pub mod envelope;
pub mod error;
pub mod firmware;
pub mod models;
pub mod operation;
pub mod reconciler;

pub use command_map::CommandTable;
pub use correlator::{PendingRequest, RequestCorrelator};
pub use envelope::{BizEvent, BizRequest, BizResponse};
pub use error::{ErrorCode, ErrorTable};
pub use firmware::FirmwareVersion;
pub use models::{UnifiedAttributesData, UnifiedStatusData};
pub use operation::OperationKind;
pub use reconciler::{DeltaOutcome, StatusReconciler, StatusSnapshot, merge_json};
