// Core infrastructure modules
pub mod database; // Connection pool, schema, grouped-count helpers
pub mod mailer; // Outbound mail collaborator
pub mod middleware; // Session -> ViewerContext plumbing
pub mod security; // Password hashing and sessions
pub mod storage; // Image object storage collaborator
pub mod viewer; // Viewer context

pub use database::{Database, Tx};
pub use mailer::{LogMailer, MailMessage, Mailer};
pub use middleware::Vc;
pub use storage::{ImageStore, ImageUpload, LocalImageStore};
pub use viewer::ViewerContext;
