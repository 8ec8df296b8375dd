//! Per-User Project Visibility Cache
//!
//! Read-side memoization of "projects visible to user X". Membership is
//! security-relevant, so entries are invalidated explicitly whenever project
//! membership changes (create, delete, role grant/revoke); the TTL is only a
//! backstop, never the primary invalidation mechanism.

use crate::model::{ProjectId, UserId};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Visibility cache keyed by user ID
pub struct VisibilityCache {
    cache: Cache<UserId, Arc<Vec<ProjectId>>>,
}

impl VisibilityCache {
    /// Create cache with entry capacity and backstop TTL
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Cached visible-project set for a user
    pub fn get(&self, user_id: &UserId) -> Option<Arc<Vec<ProjectId>>> {
        self.cache.get(user_id)
    }

    /// Memoize the visible-project set for a user
    pub fn insert(&self, user_id: UserId, projects: Vec<ProjectId>) {
        self.cache.insert(user_id, Arc::new(projects));
    }

    /// Drop entries for the affected users. Called synchronously from the
    /// create/delete/membership-change paths.
    pub fn invalidate(&self, user_ids: &[UserId]) {
        for user_id in user_ids {
            self.cache.invalidate(user_id);
        }
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Current entry count
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VisibilityCache {
    fn default() -> Self {
        Self::new(20_480, Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_insert_get_invalidate() {
        let cache = VisibilityCache::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let project = Uuid::new_v4();

        cache.insert(user, vec![project]);
        cache.insert(other, vec![]);
        assert_eq!(cache.get(&user).unwrap().as_slice(), &[project]);

        cache.invalidate(&[user]);
        assert!(cache.get(&user).is_none());
        // Untouched users keep their entries
        assert!(cache.get(&other).is_some());
    }
}
