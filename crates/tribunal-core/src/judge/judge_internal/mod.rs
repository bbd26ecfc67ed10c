//! - run.rs: evaluate flows and winner marking
//! - prompt.rs: prompt builders only
//! - client.rs: judge call and JSON extraction boundary

pub(crate) mod client;
pub(crate) mod prompt;
pub(crate) mod run;
