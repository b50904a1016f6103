//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&SqlitePool` as the first argument.

pub mod job_repo;
pub mod video_repo;

pub use job_repo::JobRepo;
pub use video_repo::VideoRepo;
