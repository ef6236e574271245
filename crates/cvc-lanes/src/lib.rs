//! Lanes: named, parallel histories of a set of components.
//!
//! A lane holds one head version per component. Snapping on a lane moves
//! that lane's head without touching main; merging reconciles two histories;
//! removing a lane detaches its ref but keeps every object, so any past lane
//! state can be restored by hash.
//!
//! The [`LaneManager`] owns all of it. Lane history recording is switched by
//! [`LaneConfig::history_enabled`].

pub mod config;
pub mod diff;
pub mod error;
pub mod manager;
pub mod merge;

pub use config::LaneConfig;
pub use diff::{ChangeType, ComponentDiff, LaneDiff};
pub use error::{LaneError, LaneResult};
pub use manager::{HistoryCheckout, LaneManager, LaneState};
pub use merge::{ComponentMerge, MergeOutcome, MergeReport, MergeStrategy};
