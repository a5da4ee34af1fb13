//! Transaction confirmation monitoring.
//!
//! The tracker polls a chain until a transaction is mined and buried under the
//! requested number of blocks, streaming progress to the subscriber.

pub mod tracker;

pub use tracker::{
	PendingConfirmation, TrackOptions, TrackedTransaction, TrackerError, TrackerState,
	TransactionEvent, TransactionSubscription, TransactionTracker,
};
