//! Client-side driver for asynchronous video annotation jobs.
//!
//! This crate drives a submitted annotation job from submission to a terminal
//! state by polling a relay server on a fixed interval, then downloading the
//! annotated result exactly once. It is deliberately decoupled from any
//! rendering layer: consumers observe progress through a watch channel and
//! receive the finished video as opaque bytes.
//!
//! The crate provides:
//! - A [`RelayApi`] trait abstracting the relay's HTTP surface, with a
//!   production [`HttpRelayClient`] and a scriptable [`MockRelayClient`] for
//!   tests.
//! - [`JobWatcher`], the submit → poll → download state machine. At most one
//!   polling timer is active per watcher; starting a new job cancels the
//!   previous one.
//! - [`LiveCaptureDriver`], a fixed-period frame analyzer with an in-flight
//!   guard so a slow backend never accumulates overlapping requests.
//!
//! # Example
//! ```ignore
//! use jobwatch::{HttpRelayClient, JobWatcher, VideoUpload, WatchState};
//!
//! let client = HttpRelayClient::new("http://127.0.0.1:8001".parse()?);
//! let mut watcher = JobWatcher::new(client);
//! let mut states = watcher.subscribe();
//!
//! watcher.start(VideoUpload::new(video_bytes, "clip.mp4"));
//! while states.changed().await.is_ok() {
//!     if let WatchState::Complete { video, .. } = &*states.borrow() {
//!         std::fs::write("annotated.mp4", video)?;
//!         break;
//!     }
//! }
//! ```

pub mod capture;
pub mod client;
pub mod error;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use capture::{CaptureConfig, LiveCaptureDriver};
pub use client::{HttpRelayClient, MockCall, MockRelayClient, RelayApi};
pub use error::{Result, WatchError};
pub use types::{JobProgress, JobStatus, VideoUpload};
pub use watcher::{JobWatcher, WatchState, WatcherConfig};
