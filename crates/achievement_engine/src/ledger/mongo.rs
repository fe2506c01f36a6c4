//! MongoDB-backed unlock ledger.

use super::{UnlockLedger, UnlockRecord};
use crate::error::LedgerError;
use accolade_event_system::UserId;
use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Stored shape of an [`UnlockRecord`]; timestamps are native BSON dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnlockDocument {
    user_id: String,
    achievement_id: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    unlocked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl From<UnlockRecord> for UnlockDocument {
    fn from(record: UnlockRecord) -> Self {
        Self {
            user_id: record.user_id.0,
            achievement_id: record.achievement_id,
            unlocked_at: record.unlocked_at,
            data: record.data,
        }
    }
}

impl From<UnlockDocument> for UnlockRecord {
    fn from(document: UnlockDocument) -> Self {
        Self {
            user_id: UserId(document.user_id),
            achievement_id: document.achievement_id,
            unlocked_at: document.unlocked_at,
            data: document.data,
        }
    }
}

/// Ledger stored in a MongoDB collection with a unique compound index on
/// `(user_id, achievement_id)`.
#[derive(Debug, Clone)]
pub struct MongoUnlockLedger {
    collection: Collection<UnlockDocument>,
}

impl MongoUnlockLedger {
    /// Connects, verifies the server answers, and ensures the unique index.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, LedgerError> {
        info!("🔌 Connecting to MongoDB at {}", uri);

        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(map_mongo_error)?;
        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_error)?;

        let ledger = Self {
            collection: client.database(database).collection(collection),
        };
        ledger.ensure_indexes().await?;

        info!("✅ Unlock ledger ready in {}.{}", database, collection);
        Ok(ledger)
    }

    async fn ensure_indexes(&self) -> Result<(), LedgerError> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "achievement_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_achievement_unique".to_string())
                    .build(),
            )
            .build();

        self.collection
            .create_index(index)
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

fn map_mongo_error(error: MongoError) -> LedgerError {
    match error.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
            LedgerError::Unavailable(error.to_string())
        }
        _ => LedgerError::Backend(error.to_string()),
    }
}

#[async_trait]
impl UnlockLedger for MongoUnlockLedger {
    async fn find_one(
        &self,
        user_id: &UserId,
        achievement_id: &str,
    ) -> Result<Option<UnlockRecord>, LedgerError> {
        let document = self
            .collection
            .find_one(doc! { "user_id": user_id.as_str(), "achievement_id": achievement_id })
            .await
            .map_err(map_mongo_error)?;
        Ok(document.map(UnlockRecord::from))
    }

    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        match self
            .collection
            .insert_one(UnlockDocument::from(record.clone()))
            .await
        {
            Ok(_) => Ok(record),
            Err(e) if is_duplicate_key(&e) => Err(LedgerError::Duplicate {
                user_id: record.user_id,
                achievement_id: record.achievement_id,
            }),
            Err(e) => Err(map_mongo_error(e)),
        }
    }

    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        let cursor = self
            .collection
            .find(doc! { "user_id": user_id.as_str() })
            .sort(doc! { "unlocked_at": 1 })
            .await
            .map_err(map_mongo_error)?;

        let documents: Vec<UnlockDocument> = cursor.try_collect().await.map_err(map_mongo_error)?;
        Ok(documents.into_iter().map(UnlockRecord::from).collect())
    }

    fn ledger_name(&self) -> &str {
        "mongodb"
    }
}
