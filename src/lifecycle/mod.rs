//! Post-handshake orchestration and its report.

pub mod orchestrator;
pub mod report;

pub use orchestrator::LifecycleOrchestrator;
pub use report::{
    FailureSummary, IntrospectionOutcome, LifecycleReport, ReportSummary, RevocationStatus,
    UserInfo,
};
