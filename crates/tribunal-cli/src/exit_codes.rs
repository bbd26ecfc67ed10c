//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
/// Invalid or unreadable suite, or missing provider credentials.
pub const CONFIG_ERROR: i32 = 2;
