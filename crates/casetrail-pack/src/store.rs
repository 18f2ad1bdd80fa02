//! In-memory `PackStore`.
//!
//! Enforces the pack lifecycle at the storage boundary: once a pack is
//! terminal its status, snapshot boundary, stored head and signature are
//! frozen, and only re-verification fields may change.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::ReportId,
    pack::{DefensePack, PackId},
};
use casetrail_core::traits::PackStore;

#[derive(Default)]
pub struct InMemoryPackStore {
    packs: Mutex<HashMap<PackId, DefensePack>>,
}

impl InMemoryPackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CaseResult<MutexGuard<'_, HashMap<PackId, DefensePack>>> {
        self.packs.lock().map_err(|e| CaseError::Store {
            reason: format!("pack store lock poisoned: {}", e),
        })
    }
}

fn not_found(id: &PackId) -> CaseError {
    CaseError::PackNotFound {
        pack_id: id.to_string(),
    }
}

impl PackStore for InMemoryPackStore {
    fn insert(&self, pack: DefensePack) -> CaseResult<()> {
        let mut packs = self.lock()?;
        if packs.contains_key(&pack.id) {
            return Err(CaseError::Store {
                reason: format!("defense pack {} already exists", pack.id),
            });
        }
        packs.insert(pack.id, pack);
        Ok(())
    }

    fn get(&self, id: &PackId) -> CaseResult<DefensePack> {
        self.lock()?.get(id).cloned().ok_or_else(|| not_found(id))
    }

    fn update(&self, pack: &DefensePack) -> CaseResult<()> {
        let mut packs = self.lock()?;
        let stored = packs.get_mut(&pack.id).ok_or_else(|| not_found(&pack.id))?;

        if stored.is_terminal() {
            if stored.status != pack.status {
                return Err(CaseError::InvalidTransition {
                    from: stored.status.to_string(),
                    to: pack.status.to_string(),
                });
            }
            let frozen_changed = stored.events_count != pack.events_count
                || stored.stored_head != pack.stored_head
                || stored.signature != pack.signature
                || stored.reason_code != pack.reason_code
                || stored.generated_at != pack.generated_at;
            if frozen_changed {
                return Err(CaseError::Store {
                    reason: format!("defense pack {} is terminal; its snapshot fields are immutable", pack.id),
                });
            }
        }

        *stored = pack.clone();
        Ok(())
    }

    fn list_for_report(&self, report_id: &ReportId) -> CaseResult<Vec<DefensePack>> {
        let packs = self.lock()?;
        let mut matching: Vec<DefensePack> = packs
            .values()
            .filter(|pack| pack.report_id == *report_id)
            .cloned()
            .collect();
        matching.sort_by_key(|pack| pack.created_at);
        Ok(matching)
    }
}
