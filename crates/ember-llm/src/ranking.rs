//! Provider ordering from the configured priority list.

use std::sync::Arc;

use crate::provider::Provider;

/// Sort `providers` by the position of their name in `priority`.
///
/// Unranked providers sort after every ranked one, keeping their relative
/// input order among themselves. The sort is stable, so applying it twice
/// is a no-op, and it neither drops nor duplicates providers.
pub fn rank_providers(providers: &mut [Arc<dyn Provider>], priority: &[String]) {
    providers.sort_by_key(|provider| {
        priority
            .iter()
            .position(|name| name == provider.name())
            .unwrap_or(usize::MAX)
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
