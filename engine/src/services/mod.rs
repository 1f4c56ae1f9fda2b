pub mod cohort_aligner;
pub mod comparison_builder;
pub mod dashboard;

pub use cohort_aligner::{align_cohorts, filter_table};
pub use comparison_builder::build_comparison;
pub use dashboard::{build_dashboard, ChartOutcome, Dashboard, SessionState};
