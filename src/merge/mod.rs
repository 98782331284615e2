pub mod engine;
pub mod error;
mod state;
pub mod types;

pub use engine::{merge, merge_records};
pub use error::{MalformedRecord, MergeError, MergeResult};
pub use types::{
    AnnotatedEvent, EntityId, Instant, MergeOutcome, MergeStats, RaterId, RatingRecord,
    RatingValue, Stream, Supplied, TargetEvent,
};
