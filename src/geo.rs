// src/geo.rs
//! Geographic primitives: haversine distance, coordinate bucketing for the
//! POI cache, and display rounding for spoken distances.

/// Mean Earth radius in meters (WGS-84 sphere).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS-84 points.
pub fn haversine_meters(a_lat: f64, a_lng: f64, b_lat: f64, b_lng: f64) -> f64 {
    let d_lat = (b_lat - a_lat).to_radians();
    let d_lng = (b_lng - a_lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a_lat.to_radians().cos() * b_lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// True when the pair is a usable WGS-84 coordinate.
pub fn valid_coords(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Round a coordinate to 4 decimal places (~11 m).
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Cache key for a proximity query. 4-decimal truncation means nearby
/// requests land in the same ~11 m bucket and reuse the cached POI set.
pub fn bucket_key(lat: f64, lng: f64, radius_m: u32) -> String {
    format!("{:.4},{:.4},{}", round4(lat), round4(lng), radius_m)
}

/// Round a distance to the nearest multiple of `step_m` for display.
/// Never rounds a nonzero distance down to 0.
pub fn round_display_distance(meters: f64, step_m: u32) -> u32 {
    let step = step_m.max(1) as f64;
    let rounded = (meters / step).round() * step;
    let out = rounded as u32;
    if out == 0 && meters > 0.0 {
        step_m.max(1)
    } else {
        out
    }
}
