use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// Per-path generation counters.
///
/// Writers bump a path after changing data rendered there; readers fold the
/// generation into their `ETag` so cached copies go stale.
#[derive(Clone, Default)]
pub struct Revalidator {
    generations: Arc<RwLock<HashMap<String, u64>>>,
}

impl Revalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revalidate_path(&self, path: &str) {
        let mut map = self
            .generations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let gen = map.entry(path.to_string()).or_insert(0);
        *gen += 1;
        debug!(path, generation = *gen, "path revalidated");
    }

    pub fn generation(&self, path: &str) -> u64 {
        self.generations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}
