use crate::models::{UsageEntry, UsageLedger, User};
use crate::services::{ServiceError, UserStore};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for usage-service");

        let users = self.users();

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(
                IndexOptions::builder()
                    .name("username_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        users.create_index(username_index, None).await.map_err(|e| {
            tracing::error!("Failed to create username index on users collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created unique index on users.username");

        // Admin documents carry no api_key, so uniqueness only covers present keys.
        let api_key_index = IndexModel::builder()
            .keys(doc! { "api_key": 1 })
            .options(
                IndexOptions::builder()
                    .name("api_key_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "api_key": { "$type": "string" } })
                    .build(),
            )
            .build();

        users.create_index(api_key_index, None).await.map_err(|e| {
            tracing::error!("Failed to create api_key index on users collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created partial unique index on users.api_key");

        let admin_index = IndexModel::builder()
            .keys(doc! { "is_admin": 1 })
            .options(
                IndexOptions::builder()
                    .name("is_admin_lookup".to_string())
                    .build(),
            )
            .build();

        users.create_index(admin_index, None).await.map_err(|e| {
            tracing::error!("Failed to create is_admin index on users collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created index on users.is_admin");

        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    async fn set_fields(&self, user_id: &str, fields: Document) -> Result<(), ServiceError> {
        let result = self
            .users()
            .update_one(doc! { "_id": user_id }, doc! { "$set": fields }, None)
            .await?;

        if result.matched_count == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl UserStore for MongoDb {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users()
            .find_one(doc! { "api_key": api_key }, None)
            .await?)
    }

    async fn list_non_admin(&self) -> Result<Vec<User>, ServiceError> {
        let cursor = self
            .users()
            .find(doc! { "is_admin": { "$ne": true } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                // The api_key index can also trip here; a UUID collision is not
                // worth distinguishing from a taken username.
                tracing::warn!(username = %user.username, "Duplicate key on user insert");
                Err(ServiceError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_open_entries(
        &self,
        user_id: &str,
        entries: &[UsageEntry],
    ) -> Result<(), ServiceError> {
        self.set_fields(user_id, doc! { "usage_entries": to_bson(entries)? })
            .await
    }

    async fn save_ledger(&self, user_id: &str, ledger: &UsageLedger) -> Result<(), ServiceError> {
        self.set_fields(
            user_id,
            doc! {
                "usage_entries": to_bson(ledger.open_entries())?,
                "usage_history": to_bson(ledger.history())?,
            },
        )
        .await
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::from(e)
            })?;
        Ok(())
    }
}
