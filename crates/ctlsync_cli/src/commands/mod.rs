//! CLI command implementations.

pub mod evidence;
pub mod io;
pub mod reconcile;
