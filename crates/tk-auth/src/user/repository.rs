//! User Repository

use mongodb::{bson::doc, Collection, Database};

use crate::shared::error::Result;
use crate::social::provider::SocialProvider;
use crate::user::entity::User;

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// Case-insensitive lookup by login identifier. Deleted users are
    /// returned too; the login pipeline reports their state explicitly.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "username": username.to_lowercase() })
            .await?)
    }

    pub async fn find_by_provider_id(
        &self,
        provider: SocialProvider,
        provider_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { provider.id_field(): provider_id })
            .await?)
    }

    /// Lookup used when redeeming an exchange token. Deleted users are
    /// filtered out here so redemption cannot resurrect them.
    pub async fn find_for_redemption(&self, field: &str, value: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { field: value, "deleted": false })
            .await?)
    }

    pub async fn update(&self, user: &User) -> Result<()> {
        self.collection
            .replace_one(doc! { "_id": &user.id }, user)
            .await?;
        Ok(())
    }

    pub async fn set_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        let now = mongodb::bson::DateTime::now();
        let result = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "passwordHash": password_hash, "updatedAt": now } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    /// Clear the correlation digest, but only if it still matches the
    /// expected value. The conditional filter makes redemption single-use:
    /// of two racing redemptions exactly one sees `modified_count == 1`.
    pub async fn claim_social_login_hash(&self, id: &str, expected_hash: &str) -> Result<bool> {
        let now = mongodb::bson::DateTime::now();
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "socialLoginHash": expected_hash },
                doc! { "$unset": { "socialLoginHash": "" }, "$set": { "updatedAt": now } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}

#[cfg(test)]
mod tests {
    // Repository tests require MongoDB connection
    // These would typically be integration tests
}
