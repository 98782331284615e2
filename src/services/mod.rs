pub mod annotation;
pub mod combining;
pub mod extraction;
pub mod importing;
pub mod splitting;

pub use annotation::{AnnotationService, AnnotationSummary};
pub use combining::{CombineSummary, CombiningService};
pub use extraction::{ExtractionService, ExtractionSummary};
pub use importing::{ImportService, ImportSummary};
pub use splitting::{SplitSummary, SplittingService};
