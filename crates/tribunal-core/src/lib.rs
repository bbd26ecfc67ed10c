pub mod candidate;
pub mod config;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod model;
pub mod providers;
pub mod rubric;
pub mod suite;
pub mod variants;

pub mod report;
pub mod results;
