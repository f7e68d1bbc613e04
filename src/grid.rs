//! Maidenhead locators and great-circle distance, used to pick local skimmers.

use crate::spot::normalize_callsign;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Centre of a 2, 4, 6 or 8 character Maidenhead locator as `(lat, lon)` degrees.
///
/// Returns `None` for any other length or for characters outside the locator alphabet.
pub fn grid_to_lat_lon(grid: &str) -> Option<(f64, f64)> {
    let g: Vec<u8> = grid.trim().to_ascii_uppercase().into_bytes();
    if !matches!(g.len(), 2 | 4 | 6 | 8) {
        return None;
    }

    let letter = |c: u8, max: u8| (b'A'..=max).contains(&c).then(|| f64::from(c - b'A'));
    let digit = |c: u8| c.is_ascii_digit().then(|| f64::from(c - b'0'));

    // Cell size in degrees at the finest pair given.
    let (mut lon_step, mut lat_step) = (20.0, 10.0);
    let mut lon = letter(g[0], b'R')? * lon_step - 180.0;
    let mut lat = letter(g[1], b'R')? * lat_step - 90.0;

    if g.len() >= 4 {
        (lon_step, lat_step) = (2.0, 1.0);
        lon += digit(g[2])? * lon_step;
        lat += digit(g[3])? * lat_step;
    }
    if g.len() >= 6 {
        (lon_step, lat_step) = (2.0 / 24.0, 1.0 / 24.0);
        lon += letter(g[4], b'X')? * lon_step;
        lat += letter(g[5], b'X')? * lat_step;
    }
    if g.len() == 8 {
        (lon_step, lat_step) = (lon_step / 10.0, lat_step / 10.0);
        lon += digit(g[6])? * lon_step;
        lat += digit(g[7])? * lat_step;
    }

    Some((lat + lat_step / 2.0, lon + lon_step / 2.0))
}

/// Haversine distance in km between two `(lat, lon)` points.
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance in km between two locators, or `None` if either is malformed.
pub fn grid_distance_km(a: &str, b: &str) -> Option<f64> {
    Some(distance_km(grid_to_lat_lon(a)?, grid_to_lat_lon(b)?))
}

/// Spotters whose locator lies strictly within `max_km` of `home`.
///
/// The result feeds `BandmapConfig::allowed_spotters`. Spotters with a
/// malformed locator are skipped, as is everything when `home` is malformed.
pub fn local_spotters<'a, I>(home: &str, spotters: I, max_km: f64) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let Some(home) = grid_to_lat_lon(home) else {
        return Vec::new();
    };
    spotters
        .into_iter()
        .filter_map(|(call, grid)| {
            let dist = distance_km(home, grid_to_lat_lon(grid)?);
            (dist < max_km).then(|| normalize_callsign(call))
        })
        .collect()
}
