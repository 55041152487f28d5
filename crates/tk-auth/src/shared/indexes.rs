//! MongoDB Index Initialization
//!
//! Creates indexes for all collections on application startup.

use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};
use tracing::info;

/// Initialize all MongoDB indexes
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create_user_indexes(db).await?;
    create_session_indexes(db).await?;
    create_attempt_indexes(db).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let users = db.collection::<mongodb::bson::Document>("users");

    // Login identifier lookup (unique)
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .background(true)
                        .build(),
                )
                .build(),
        )
        .await?;

    // External identity lookups (unique, sparse: most users have none)
    for field in ["githubId", "googleId", "bitbucketId", "weixinId"] {
        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .sparse(true)
                            .background(true)
                            .build(),
                    )
                    .build(),
            )
            .await?;
    }

    info!("Created indexes on users");
    Ok(())
}

async fn create_session_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let sessions = db.collection::<mongodb::bson::Document>("sessions");

    // Owner lookup, used when revoking everything a user holds
    sessions
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    // Expiry sweep
    sessions
        .create_index(
            IndexModel::builder()
                .keys(doc! { "expiresAt": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("Created indexes on sessions");
    Ok(())
}

async fn create_attempt_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let attempts = db.collection::<mongodb::bson::Document>("authAttempts");

    // The two sliding-window counts behind the lockout check
    attempts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "ip": 1, "time": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    attempts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "ip": 1, "username": 1, "time": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("Created indexes on authAttempts");
    Ok(())
}
