//! Development Data Seeder
//!
//! Seeds development accounts on application startup.
//!
//! Default credentials:
//!   Administrator: admin / DevPassword123!
//!   Member:        demo / DevPassword123!

use mongodb::Database;
use tracing::info;

use crate::auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
use crate::user::entity::{User, UserRole};
use crate::user::repository::UserRepository;

const DEV_PASSWORD: &str = "DevPassword123!";

/// Development data seeder
pub struct DevDataSeeder {
    db: Database,
    password_service: PasswordService,
}

impl DevDataSeeder {
    pub fn new(db: Database) -> Self {
        // Use testing config for faster seeding, but still Argon2id
        let password_service =
            PasswordService::new(Argon2Config::testing(), PasswordPolicy::lenient());
        Self {
            db,
            password_service,
        }
    }

    /// Seed all development data
    pub async fn seed(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== DEV DATA SEEDER ===");
        info!("Seeding development data...");

        self.seed_users().await?;

        info!("Development data seeded successfully!");
        info!("");
        info!("Default logins:");
        info!("  Administrator: admin / {}", DEV_PASSWORD);
        info!("  Member:        demo / {}", DEV_PASSWORD);
        info!("=======================");

        Ok(())
    }

    async fn seed_users(&self) -> Result<(), Box<dyn std::error::Error>> {
        let repo = UserRepository::new(&self.db);

        let password_hash = self
            .password_service
            .hash_password(DEV_PASSWORD)
            .map_err(|e| format!("Failed to hash password: {}", e))?;

        self.create_user_if_not_exists(
            &repo,
            "admin",
            "admin@turnkey.local",
            &password_hash,
            UserRole::Administrator,
        )
        .await?;

        self.create_user_if_not_exists(
            &repo,
            "demo",
            "demo@turnkey.local",
            &password_hash,
            UserRole::Member,
        )
        .await?;

        Ok(())
    }

    async fn create_user_if_not_exists(
        &self,
        repo: &UserRepository,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if repo.find_by_username(username).await?.is_some() {
            return Ok(());
        }

        let user = User::new(username, password_hash)
            .with_email(email)
            .with_role(role);
        repo.insert(&user).await?;
        info!("Created user: {} ({})", username, email);

        Ok(())
    }
}
