pub mod jobs;
pub mod video;
