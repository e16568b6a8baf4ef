//! Core traits defined in `taskhub-core` and implemented across the workspace.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
