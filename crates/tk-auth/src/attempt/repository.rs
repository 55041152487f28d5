//! Auth Attempt Repository

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, Collection, Database};

use crate::attempt::entity::AuthAttempt;
use crate::shared::error::Result;

pub struct AttemptRepository {
    collection: Collection<AuthAttempt>,
}

impl AttemptRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("authAttempts"),
        }
    }

    pub async fn insert(&self, attempt: &AuthAttempt) -> Result<()> {
        self.collection.insert_one(attempt).await?;
        Ok(())
    }

    /// Failed attempts from one IP since the window start.
    pub async fn count_for_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<u64> {
        let since = mongodb::bson::DateTime::from_chrono(since);
        Ok(self
            .collection
            .count_documents(doc! { "ip": ip, "time": { "$gt": since } })
            .await?)
    }

    /// Failed attempts from one (IP, username) pair since the window start.
    pub async fn count_for_ip_and_username_since(
        &self,
        ip: &str,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let since = mongodb::bson::DateTime::from_chrono(since);
        Ok(self
            .collection
            .count_documents(doc! {
                "ip": ip,
                "username": username.to_lowercase(),
                "time": { "$gt": since }
            })
            .await?)
    }

    /// Delete attempts older than the cutoff (cleanup job)
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = mongodb::bson::DateTime::from_chrono(cutoff);
        let result = self
            .collection
            .delete_many(doc! { "time": { "$lt": cutoff } })
            .await?;
        Ok(result.deleted_count)
    }
}
