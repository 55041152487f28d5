//! Session Repository

use chrono::Utc;
use mongodb::{bson::doc, Collection, Database};

use crate::session::entity::Session;
use crate::shared::error::Result;

pub struct SessionRepository {
    collection: Collection<Session>,
}

impl SessionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("sessions"),
        }
    }

    pub async fn insert(&self, session: &Session) -> Result<()> {
        self.collection.insert_one(session).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// Delete one session (logout).
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    /// Delete every session a user owns (revoke everywhere).
    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "userId": user_id })
            .await?;
        Ok(result.deleted_count)
    }

    /// Delete expired sessions (cleanup job)
    pub async fn delete_expired(&self) -> Result<u64> {
        let now = mongodb::bson::DateTime::from_chrono(Utc::now());
        let result = self
            .collection
            .delete_many(doc! { "expiresAt": { "$lt": now } })
            .await?;
        Ok(result.deleted_count)
    }
}
