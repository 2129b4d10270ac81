//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings that shape a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bin count used by `histogram` and `axis` when none is given.
    pub default_num_bins: usize,
    /// Whether every node's final value is kept in the symbol table.
    pub record_symbols: bool,
    /// Identifiers written by `save_cache`. Empty means all of them.
    pub persist: Vec<String>,
    /// Optional per-identifier cap on retained entries.
    pub max_history: Option<usize>,
}

impl SessionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.default_num_bins == 0 {
            return Err(Error::validation(
                "config",
                "default_num_bins must be > 0",
            ));
        }
        // Gradients need two entries to ever become computable.
        if let Some(cap) = self.max_history
            && cap < 2
        {
            return Err(Error::validation("config", "max_history must be >= 2"));
        }
        Ok(())
    }

    pub fn with_default_num_bins(mut self, bins: usize) -> Self {
        self.default_num_bins = bins;
        self
    }

    pub fn with_persist(mut self, identifiers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.persist = identifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_history(mut self, cap: usize) -> Self {
        self.max_history = Some(cap);
        self
    }

    pub fn without_symbols(mut self) -> Self {
        self.record_symbols = false;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_num_bins: 256,
            record_symbols: true,
            persist: Vec::new(),
            max_history: None,
        }
    }
}
