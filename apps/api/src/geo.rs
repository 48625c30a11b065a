//! Geohash encoding — turns a lat/lon pair into the fixed-precision spatial
//! key the upstream API and the response cache are keyed on.

/// The 32-symbol geohash alphabet (base32 without a, i, l, o).
const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Default key precision used for upstream queries.
pub const DEFAULT_PRECISION: usize = 9;

/// Encodes a coordinate pair as a geohash of `precision` characters.
/// Returns `None` when the pair lies outside [-90,90] × [-180,180] —
/// callers fall back to a default reference point via [`spatial_key`].
pub fn encode(lat: f64, lon: f64, precision: usize) -> Option<String> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut ch: usize = 0;
    let mut bit = 0;
    // Even bit index refines longitude, odd refines latitude.
    let mut even = true;

    while hash.len() < precision {
        if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch = (ch << 1) | 1;
                lon_range.0 = mid;
            } else {
                ch <<= 1;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                lat_range.0 = mid;
            } else {
                ch <<= 1;
                lat_range.1 = mid;
            }
        }
        even = !even;
        bit += 1;
        if bit == 5 {
            hash.push(BASE32[ch] as char);
            ch = 0;
            bit = 0;
        }
    }

    Some(hash)
}

/// Decodes a geohash to the centroid of its cell. Lossy: used only as the
/// last coordinate-extraction fallback in the normalizer, never as a
/// primary source. Returns `None` for an empty string or a character
/// outside the alphabet.
pub fn decode(hash: &str) -> Option<(f64, f64)> {
    if hash.is_empty() {
        return None;
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for c in hash.bytes().map(|b| b.to_ascii_lowercase()) {
        let idx = BASE32.iter().position(|&b| b == c)?;
        for shift in (0..5).rev() {
            let is_set = (idx >> shift) & 1 == 1;
            let range = if even { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if is_set {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Some((
        (lat_range.0 + lat_range.1) / 2.0,
        (lon_range.0 + lon_range.1) / 2.0,
    ))
}

/// Encodes `(lat, lon)`, falling back to `fallback` when the input violates
/// the coordinate bounds. Location is best-effort: a bad pair degrades to
/// the configured reference point rather than failing the request.
pub fn spatial_key(lat: f64, lon: f64, precision: usize, fallback: (f64, f64)) -> String {
    encode(lat, lon, precision)
        .or_else(|| encode(fallback.0, fallback.1, precision))
        .unwrap_or_default()
}
