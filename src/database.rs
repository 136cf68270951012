//! Database initialization and table definitions
//!
//! This module handles the setup and configuration of the embedded redb
//! database and defines the application state shared by all handlers.

use redb::{Database, TableDefinition};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::{AuthEvent, DisabledOAuth, OAuthProvider};
use crate::config::Config;
use crate::storage::ImageStore;
use crate::store::RedbStore;

/// Main table for property listings
///
/// Key: listing id as string
/// Value: JSON-serialized Property as string
pub const PROPERTIES: TableDefinition<&str, &str> = TableDefinition::new("properties_v1");

/// Index table for the "my postings" view
///
/// Key: composite key in format "{user_id}:{timestamp_micros}:{listing_id}"
/// Value: listing id
///
/// The timestamp in the key keeps a user's listings in chronological order;
/// the trailing listing id makes the key unique even for same-instant writes.
pub const OWNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("owner_index_v1");

/// Table for user accounts
///
/// Key: user id
/// Value: JSON-serialized User as string
pub const USERS: TableDefinition<&str, &str> = TableDefinition::new("users_v1");

/// Index table mapping lowercased email addresses to user ids
pub const EMAIL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("email_index_v1");

/// Table for active sessions
///
/// Key: session token
/// Value: JSON-serialized Session as string
pub const SESSIONS: TableDefinition<&str, &str> = TableDefinition::new("sessions_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,

    /// Listing store, the query-execution port over the database
    pub store: Arc<RedbStore>,

    /// Directory-backed store for uploaded listing images
    pub images: Arc<ImageStore>,

    /// OAuth code-exchange provider used by the /auth/callback route
    pub oauth: Arc<dyn OAuthProvider>,

    /// Broadcast channel notified on sign-in and sign-out
    pub auth_events: broadcast::Sender<AuthEvent>,

    /// Runtime configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the application state around an opened database.
    ///
    /// OAuth sign-in starts out disabled; install a real provider with
    /// [`AppState::with_oauth_provider`].
    pub fn new(db: Database, config: Config) -> Self {
        let db = Arc::new(db);
        let (auth_events, _) = broadcast::channel(16);
        let public_images = format!("{}/images", config.public_url);

        AppState {
            store: Arc::new(RedbStore::new(db.clone())),
            images: Arc::new(ImageStore::new(config.image_dir.clone(), public_images)),
            oauth: Arc::new(DisabledOAuth),
            auth_events,
            config: Arc::new(config),
            db,
        }
    }

    /// Replaces the OAuth provider used by the callback route.
    pub fn with_oauth_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.oauth = provider;
        self
    }
}

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Returns
///
/// * `Ok(Database)` - Successfully initialized database instance
/// * `Err(redb::Error)` - Database initialization error
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    // Create or open the database file
    let db = Database::create(db_path)?;

    // Begin a write transaction to create tables
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(PROPERTIES)?;
        write_txn.open_table(OWNER_INDEX)?;
        write_txn.open_table(USERS)?;
        write_txn.open_table(EMAIL_INDEX)?;
        write_txn.open_table(SESSIONS)?;
    }

    // Commit the transaction to persist the table structures
    write_txn.commit()?;

    Ok(db)
}
