// Entities - row types and the SQL that loads and mutates them
// Loaders follow the gen_nullable / gen_enforce / gen_multi naming.

pub mod ent_comment;
pub mod ent_event;
pub mod ent_group;
pub mod ent_inquiry;
pub mod ent_post;
pub mod ent_tag;
pub mod ent_user;
pub mod ent_venue;

pub use ent_comment::EntComment;
pub use ent_event::{EntEvent, EventImage};
pub use ent_group::{EntGroup, GroupImage};
pub use ent_inquiry::{EntInquiry, InquiryKind};
pub use ent_post::EntPost;
pub use ent_tag::EntTag;
pub use ent_user::{EntUser, UserProjection, UserSummary};
pub use ent_venue::EntVenue;
