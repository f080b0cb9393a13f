pub mod command;
pub mod core;
pub mod report;
pub mod result;

pub use command::CombineCMD;
pub use self::core::{
    output_file_name, plan_targets, sanitize_target_name, CombineParams, CombineTargets,
    TargetOrchestrator, TargetPlan,
};
pub use result::{CombinationResult, PairCountMismatch, RunSummary, SkipReason, TargetOutcome};
