//! Memoized regular-expression compilation.
//!
//! Every pattern is compiled as a full match (`^(?:pattern)$`). Compile
//! failures are memoized as well so a broken pattern is reported once and not
//! recompiled on every reload.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Process-scoped cache of compiled full-match regular expressions.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled full-match regex for `source`, or `None` if it does not compile.
    pub fn get_or_compile(&self, source: &str) -> Option<Arc<Regex>> {
        if let Some(cached) = self.compiled.read().get(source) {
            trace!("Regex cache hit for {:?}", source);
            return cached.clone();
        }

        let compiled = match Regex::new(&format!("^(?:{source})$")) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(e) => {
                warn!("Pattern {:?} is not a valid regular expression: {}", source, e);
                None
            }
        };

        self.compiled
            .write()
            .entry(source.to_string())
            .or_insert(compiled)
            .clone()
    }

    /// Number of memoized sources, including failed ones.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }
}
