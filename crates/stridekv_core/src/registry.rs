//! Collection names.
//!
//! Named collections map to ids handed out by the store. The empty name
//! always refers to the default collection.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, DEFAULT_COLLECTION};
use tracing::debug;

impl Database {
    /// Returns the id of the named collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for names longer than 255 bytes or
    /// containing NUL.
    pub fn collection(&self, name: &str) -> CoreResult<CollectionId> {
        let result = self.check_open().and_then(|()| {
            if name.is_empty() {
                return Ok(DEFAULT_COLLECTION);
            }
            Ok(self.inner.store.open_collection(name)?)
        });
        self.inner.tally(result)
    }

    /// Looks up a collection without creating it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after close.
    pub fn find_collection(&self, name: &str) -> CoreResult<Option<CollectionId>> {
        self.check_open()?;
        if name.is_empty() {
            return Ok(Some(DEFAULT_COLLECTION));
        }
        Ok(self.inner.store.collection_id(name)?)
    }

    /// Names of all named collections, sorted.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after close.
    pub fn collections(&self) -> CoreResult<Vec<String>> {
        self.check_open()?;
        Ok(self
            .inner
            .store
            .collections()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Removes the named collection and everything in it.
    ///
    /// The default collection cannot be removed; passing the empty name
    /// clears it instead.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` if no collection has that name.
    pub fn remove_collection(&self, name: &str) -> CoreResult<()> {
        let result = self.check_open().and_then(|()| {
            if name.is_empty() {
                self.inner.store.clear_collection(DEFAULT_COLLECTION)?;
                debug!("default collection cleared");
                return Ok(());
            }
            let id = self
                .inner
                .store
                .collection_id(name)?
                .ok_or_else(|| CoreError::collection_not_found(name))?;
            self.inner.store.drop_collection(id)?;
            debug!(name, %id, "collection removed");
            Ok(())
        });
        self.inner.tally(result)
    }
}
