//! Common imports used throughout the crate.

#[allow(unused_imports)]
pub use anyhow::{anyhow, bail, Context, Result};
#[allow(unused_imports)]
pub use log::{debug, error, info, trace, warn};
