//! Island session: generation followed by a streamed walk.

pub mod scent;
pub mod session;
pub mod simulation;

pub use scent::{Scent, ScentRegistry};
pub use session::{Session, SessionError, SessionSummary, run};
pub use simulation::{Simulation, StreamingTotals, ViewpointPath};
