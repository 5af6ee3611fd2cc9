pub mod allocator;
pub mod models;
pub mod slug;

pub use allocator::{Allocation, IdentityAllocator};
pub use models::{Location, LocationAttributes};
pub use slug::{base_slug, slugify};
