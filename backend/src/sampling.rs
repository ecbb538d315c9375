use shared::Coordinate;

/// IUGG mean Earth radius.
const EARTH_RADIUS_KM: f64 = 6_371.008_8;
/// Lower bound on sample spacing so short routes are not oversampled.
pub const MIN_STEP_KM: f64 = 10.0;
pub const DEFAULT_DESIRED_SAMPLES: usize = 10;

pub fn step_km(total_distance_km: f64, desired_samples: usize) -> f64 {
    (total_distance_km / desired_samples as f64).max(MIN_STEP_KM)
}

/// Greedy forward scan: keep the first point, then every point at least
/// `step_km` away from the last kept one.
pub fn sample_route_points(
    path: &[Coordinate],
    total_distance_km: f64,
    desired_samples: usize,
) -> Vec<Coordinate> {
    let Some((&first, rest)) = path.split_first() else {
        return Vec::new();
    };

    let step = step_km(total_distance_km, desired_samples);
    let mut sampled = vec![first];
    let mut last = first;
    for &point in rest {
        if haversine_km(last, point) >= step {
            sampled.push(point);
            last = point;
        }
    }

    tracing::debug!("Sampled {} points (step ~{:.1} km)", sampled.len(), step);
    sampled
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
