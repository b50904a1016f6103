//! Domain layer for the video sharing service.
//!
//! Holds everything that does not need a database connection or an HTTP
//! request: the error taxonomy, upload policy, storage naming, the media
//! worker contract and its ffmpeg implementation, capability-link signing,
//! job lifecycle enums, and the per-source in-flight registry.

pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod media;
pub mod naming;
pub mod share_link;
pub mod source_lock;
pub mod types;
pub mod upload;
