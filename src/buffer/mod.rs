//! Frame buffering for out-of-order network arrival
//!
//! This module provides the sequence-indexed frame store that absorbs
//! network jitter, and the playout cursor that walks a stream's sequence
//! space while recovering from loss gaps.

pub mod cursor;
pub mod store;

pub use cursor::PlayoutCursor;
pub use store::{FrameStoreStats, SequencedFrameStore};
