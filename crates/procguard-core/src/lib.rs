//! Building blocks shared by the procguard agent, its modules and its tools.
//!
//! - [`pdk`]: the module development kit used to write agent modules
//! - [`platform`]: runtime detection of the host operating system

pub mod pdk;
pub mod platform;
