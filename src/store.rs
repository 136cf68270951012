//! Listing storage port and its embedded-database implementation
//!
//! Handlers and the search session never touch the database directly; they go
//! through the [`PropertyStore`] trait so tests can substitute a fake store.
//! [`RedbStore`] executes composed queries against redb: a full scan filtered
//! through the query's predicate clauses, sorted, counted, then sliced to the
//! requested page. The owner index keeps the "my postings" view cheap.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::database::{OWNER_INDEX, PROPERTIES};
use crate::model::{PageResult, Property};
use crate::query::PropertyQuery;

/// Storage failure reported by a [`PropertyStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("stored record is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Database(err.into())
    }
}

/// Distinct location values observed in the dataset, for the filter-bar
/// dropdowns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Locations {
    pub cities: Vec<String>,
    pub countries: Vec<String>,
}

/// Port over the listing collection.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Executes a composed query and returns one page of matches plus the
    /// total match count.
    async fn search(&self, query: &PropertyQuery) -> Result<PageResult, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Property>, StoreError>;

    async fn insert(&self, property: Property) -> Result<(), StoreError>;

    /// Replaces an existing listing. The caller keeps id, owner, and
    /// created_at stable so the owner index stays valid.
    async fn update(&self, property: Property) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All listings of one owner, newest first.
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Property>, StoreError>;

    /// Distinct cities and countries across all listings.
    async fn known_locations(&self) -> Result<Locations, StoreError>;
}

/// [`PropertyStore`] backed by the embedded redb database.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(db: Arc<Database>) -> Self {
        RedbStore { db }
    }

    fn owner_key(property: &Property) -> String {
        format!(
            "{}:{}:{}",
            property.user_id,
            property.created_at.timestamp_micros(),
            property.id
        )
    }

    /// Loads every listing that deserializes cleanly.
    fn scan_all(&self) -> Result<Vec<Property>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;

        let properties = table
            .iter()?
            .filter_map(|entry| {
                entry
                    .ok()
                    .and_then(|(_, value)| serde_json::from_str::<Property>(value.value()).ok())
            })
            .collect();

        Ok(properties)
    }
}

#[async_trait]
impl PropertyStore for RedbStore {
    async fn search(&self, query: &PropertyQuery) -> Result<PageResult, StoreError> {
        let mut matched: Vec<Property> = self
            .scan_all()?
            .into_iter()
            .filter(|property| query.matches(property))
            .collect();

        query.sort_items(&mut matched);

        let total_count = matched.len();
        let items: Vec<Property> = matched
            .into_iter()
            .skip(query.offset())
            .take(query.page_size)
            .collect();

        Ok(PageResult::new(items, total_count, query.page, query.page_size))
    }

    async fn get(&self, id: &str) -> Result<Option<Property>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROPERTIES)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, property: Property) -> Result<(), StoreError> {
        let record = serde_json::to_string(&property)?;
        let index_key = Self::owner_key(&property);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROPERTIES)?;
            table.insert(property.id.as_str(), record.as_str())?;

            let mut index = write_txn.open_table(OWNER_INDEX)?;
            index.insert(index_key.as_str(), property.id.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn update(&self, property: Property) -> Result<(), StoreError> {
        let record = serde_json::to_string(&property)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROPERTIES)?;
            table.insert(property.id.as_str(), record.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROPERTIES)?;

            let existing = match table.get(id)? {
                Some(guard) => serde_json::from_str::<Property>(guard.value()).ok(),
                None => None,
            };

            table.remove(id)?;

            if let Some(property) = existing {
                let mut index = write_txn.open_table(OWNER_INDEX)?;
                index.remove(Self::owner_key(&property).as_str())?;
            }
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Property>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(OWNER_INDEX)?;
        let table = read_txn.open_table(PROPERTIES)?;

        // The character '{' sorts right after ':', bounding the owner's keys.
        let start_key = format!("{}:", user_id);
        let end_key = format!("{}:{{", user_id);

        let mut properties = Vec::new();
        for entry in index.range(start_key.as_str()..end_key.as_str())?.rev() {
            let (_, id_guard) = entry?;
            if let Some(guard) = table.get(id_guard.value())? {
                properties.push(serde_json::from_str(guard.value())?);
            }
        }

        Ok(properties)
    }

    async fn known_locations(&self) -> Result<Locations, StoreError> {
        let mut cities = BTreeSet::new();
        let mut countries = BTreeSet::new();

        for property in self.scan_all()? {
            cities.insert(property.city);
            countries.insert(property.country);
        }

        Ok(Locations {
            cities: cities.into_iter().collect(),
            countries: countries.into_iter().collect(),
        })
    }
}
