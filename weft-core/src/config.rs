//! Runtime Configuration
//!
//! Configuration is per thread, like the rest of the runtime state. It is
//! usually installed once at startup:
//!
//! ```rust,ignore
//! let config = Config::from_json(r#"{ "max_update_count": 50 }"#)?;
//! weft_core::config::set(config);
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables read by the scheduler and the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many times one subscriber may be re-queued within a single flush
    /// before the flush is aborted as an infinite update loop.
    pub max_update_count: usize,

    /// Log when a text write is skipped because the target node no longer
    /// accepts text content.
    pub warn_on_text_mismatch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_update_count: 100,
            warn_on_text_mismatch: true,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

thread_local! {
    static CURRENT: RefCell<Config> = RefCell::new(Config::default());
}

/// Install `config` for the current thread.
pub fn set(config: Config) {
    CURRENT.with(|current| *current.borrow_mut() = config);
}

/// The configuration in effect on the current thread.
pub fn current() -> Config {
    CURRENT.with(|current| current.borrow().clone())
}
