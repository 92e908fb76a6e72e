use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::{
        database::Database,
        mailer::{LogMailer, Mailer},
        storage::{ImageStore, LocalImageStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub images: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = Database::connect(&config).await?;
        db.initialize().await?;

        let images = LocalImageStore::new(&config.storage.upload_dir, &config.storage.public_url).await?;
        let mailer = LogMailer::new(config.mail.clone());

        Ok(Self::from_parts(db, Arc::new(images), Arc::new(mailer), config))
    }

    /// Assemble state around caller-supplied collaborators.
    pub fn from_parts(
        db: Database,
        images: Arc<dyn ImageStore>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        Self {
            db,
            images,
            mailer,
            config: Arc::new(config),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.is_production()
    }
}
