//! Tool registry and the file tools exposed over `tools/call`

pub mod files;
pub mod tools;
