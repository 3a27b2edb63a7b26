pub mod classifier;
pub mod filesystem;
pub mod hierarchy;
pub mod pipeline;
pub mod records;
