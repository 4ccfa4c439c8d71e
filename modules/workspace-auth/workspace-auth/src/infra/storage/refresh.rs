//! In-memory refresh-token family store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;
use workspace_auth_sdk::{RefreshFamily, RefreshTokenStore, RotationOutcome, StoreError};

use crate::domain::session::unix_now;

#[derive(Debug, Clone)]
struct FamilyState {
    family: RefreshFamily,
    revoked: bool,
}

impl FamilyState {
    fn is_live(&self, now: i64) -> bool {
        !self.revoked && self.family.expires_at > now
    }
}

/// Families keyed by id. Rotation runs under the entry's shard lock, so the
/// compare of the current jti and its replacement are a single step.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    families: DashMap<Uuid, FamilyState>,
}

impl InMemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop revoked and expired families. Returns how many were removed.
    ///
    /// A purged family answers `Unknown` instead of `Replayed` afterwards;
    /// both are rejections.
    pub fn purge_expired(&self) -> usize {
        let now = unix_now();
        let before = self.families.len();
        self.families.retain(|_, state| state.is_live(now));
        before.saturating_sub(self.families.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn register(&self, family: RefreshFamily) -> Result<(), StoreError> {
        self.families.insert(
            family.family_id,
            FamilyState {
                family,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn rotate(
        &self,
        family_id: Uuid,
        presented_jti: Uuid,
        next_jti: Uuid,
        next_expires_at: i64,
    ) -> Result<RotationOutcome, StoreError> {
        let Entry::Occupied(mut entry) = self.families.entry(family_id) else {
            return Ok(RotationOutcome::Unknown);
        };
        let state = entry.get_mut();

        if !state.is_live(unix_now()) {
            return Ok(RotationOutcome::Unknown);
        }
        if state.family.current_jti != presented_jti {
            return Ok(RotationOutcome::Replayed);
        }

        state.family.current_jti = next_jti;
        state.family.generation = state.family.generation.saturating_add(1);
        state.family.expires_at = next_expires_at;

        Ok(RotationOutcome::Rotated {
            generation: state.family.generation,
        })
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<bool, StoreError> {
        let now = unix_now();
        Ok(self.families.get_mut(&family_id).is_some_and(|mut state| {
            let was_live = state.is_live(now);
            state.revoked = true;
            was_live
        }))
    }

    async fn is_active(&self, family_id: Uuid) -> Result<bool, StoreError> {
        let now = unix_now();
        Ok(self
            .families
            .get(&family_id)
            .is_some_and(|state| state.is_live(now)))
    }
}
