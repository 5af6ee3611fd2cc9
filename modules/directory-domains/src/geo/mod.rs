pub mod bounding_box;
pub mod distance;
pub mod nearby;

pub use bounding_box::BoundingBox;
pub use distance::{distance_miles, EARTH_RADIUS_MILES};
pub use nearby::{NearbyLocation, ProximityIndex};
