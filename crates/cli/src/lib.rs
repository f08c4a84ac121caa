//! Keepsake CLI library
//!
//! Command implementations and project plumbing behind the `ks` binary.

pub mod cmd;
pub mod locks;
pub mod project;
pub mod system_config;
pub mod util;
