// Request-level building blocks shared by every resource
pub mod multipart; // multipart/form-data buffering
pub mod pagination; // 1-based page windows
pub mod privacy; // (actor, action, target) authorization policy
pub mod validation; // field checks and validated extractors

pub use multipart::FormData;
pub use pagination::{Page, PageInfo, PageParams};
pub use privacy::{authorize, Action, Target};
pub use validation::{MeetingType, ValidatedJson};
