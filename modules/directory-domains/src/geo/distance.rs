use directory_core::Coordinates;

/// Earth radius used by proximity search. Kept at 3959 so distances agree
/// with what listing pages have always displayed.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance in miles via the spherical law of cosines.
///
/// This is the exact formula the proximity query evaluates in SQL, so it can
/// be used to check query results. The cosine is clamped into `[-1, 1]` so
/// rounding on identical points never yields `NaN`.
pub fn distance_miles(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let dlng = to.longitude.to_radians() - from.longitude.to_radians();

    let cos_c = lat1.cos() * lat2.cos() * dlng.cos() + lat1.sin() * lat2.sin();
    EARTH_RADIUS_MILES * cos_c.clamp(-1.0, 1.0).acos()
}
