//! Event resolver: classify every identity as create, update, delete,
//! noop, conflict or review.

mod operation;
mod plan;
mod resolver;
mod status;

pub use operation::ResolutionOperation;
pub use plan::{ResolutionPlan, StatusCounts};
pub use resolver::{EventsByHash, ResolverPolicy, resolve};
pub use status::ResolutionStatus;
