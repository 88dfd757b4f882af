pub mod callbacks;
pub mod jobs;
