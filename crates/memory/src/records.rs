//! Operations shared by every backend that keeps instincts in a `Vec`.

use chrono::Utc;
use tessera_core::error::StoreError;
use tessera_core::instinct::{Instinct, clamp_confidence};
use tessera_core::thread::ThreadId;
use uuid::Uuid;

pub(crate) fn active_for(entries: &[Instinct], thread_id: &ThreadId) -> Vec<Instinct> {
    entries
        .iter()
        .filter(|i| i.is_active() && i.applies_to(thread_id))
        .cloned()
        .collect()
}

pub(crate) fn set_confidence(
    entries: &mut [Instinct],
    id: &str,
    value: f64,
) -> Result<(), StoreError> {
    let instinct = find_mut(entries, id)?;
    instinct.base_confidence = clamp_confidence(value);
    Ok(())
}

pub(crate) fn reinforce(
    entries: &mut [Instinct],
    id: &str,
    boost: f64,
) -> Result<Instinct, StoreError> {
    let instinct = find_mut(entries, id)?;
    instinct.reinforce(Utc::now(), boost);
    Ok(instinct.clone())
}

/// Insert or replace by id. Empty ids get a fresh UUID.
pub(crate) fn upsert(entries: &mut Vec<Instinct>, mut instinct: Instinct) -> String {
    if instinct.id.is_empty() {
        instinct.id = Uuid::new_v4().to_string();
    }
    instinct.base_confidence = clamp_confidence(instinct.base_confidence);
    let id = instinct.id.clone();
    match entries.iter_mut().find(|e| e.id == id) {
        Some(existing) => *existing = instinct,
        None => entries.push(instinct),
    }
    id
}

fn find_mut<'a>(entries: &'a mut [Instinct], id: &str) -> Result<&'a mut Instinct, StoreError> {
    entries
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}
