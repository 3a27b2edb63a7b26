pub mod catalog;
pub mod writer;
