//! Camlog Capture Engine
//!
//! Slices two live audio+video feeds into fixed-duration, self-contained
//! segment artifacts and runs the location sampler alongside them.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     CaptureSession                      │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────┐  │
//! │  │  screen    │   │  camera    │   │   Location     │  │
//! │  │  recorder  │   │  recorder  │   │   Sampler      │  │
//! │  └─────┬──────┘   └─────┬──────┘   └───────┬────────┘  │
//! │        ▼                ▼                  ▼           │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │        ArtifactSink (bounded queue → store)       │  │
//! │  │  screen_*.webm   camera_*.webm   location_*.json  │  │
//! │  └──────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The three loops run concurrently and never coordinate: each recorder
//! slices its own source on its own clock, and the sampler ticks on its
//! own period. Segment boundaries across streams are deliberately not
//! aligned.

pub mod recorder;
pub mod session;
pub mod sink;
pub mod source;

pub use recorder::*;
pub use session::*;
pub use sink::*;
pub use source::*;
