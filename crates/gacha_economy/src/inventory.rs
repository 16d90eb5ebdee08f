//! Read-only views of a user's holdings: owned characters and balance.

use uuid::Uuid;

use crate::catalog::EntryId;
use crate::draw::DrawEngine;
use crate::error::{DrawError, EconomyResult, LedgerStep};

/// A character owned by a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedCharacter {
    /// Ownership record id.
    pub ownership_id: Uuid,
    /// Catalog entry id.
    pub character_id: EntryId,
    /// Display name.
    pub name: String,
}

impl DrawEngine {
    /// Characters owned by the holder of `credential`, oldest first.
    ///
    /// Records whose entry is no longer in any catalog are skipped.
    ///
    /// # Errors
    ///
    /// Fails on a rejected credential or a store/catalog failure.
    pub fn owned_characters(&self, credential: Option<&str>) -> EconomyResult<Vec<OwnedCharacter>> {
        let user_id = self.authenticate(credential)?;
        let records = self.store.list_by_user(&user_id)?;

        let mut owned = Vec::with_capacity(records.len());
        for record in records {
            match self.catalog.lookup(&record.entry_id)? {
                Some(entry) => owned.push(OwnedCharacter {
                    ownership_id: record.ownership_id,
                    character_id: record.entry_id,
                    name: entry.name,
                }),
                None => tracing::warn!(
                    "Ownership {} references unknown entry {}",
                    record.ownership_id,
                    record.entry_id
                ),
            }
        }
        Ok(owned)
    }

    /// Balance of the holder of `credential`.
    ///
    /// # Errors
    ///
    /// Fails on a rejected credential or a ledger failure.
    pub fn balance(&self, credential: Option<&str>) -> EconomyResult<u64> {
        let user_id = self.authenticate(credential)?;
        self.ledger
            .balance(&user_id)
            .map_err(|source| DrawError::Ledger {
                step: LedgerStep::Balance,
                source,
            })
    }
}
