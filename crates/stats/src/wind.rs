//! Wind vector helpers.

use crate::{BAD, is_bad};

/// Wind speed from u and v components.
pub fn convert_u_v_to_wind(u: f64, v: f64) -> f64 {
    if is_bad(u) || is_bad(v) {
        return BAD;
    }
    u.hypot(v)
}

/// Meteorological wind direction (degrees the wind blows from, in `[0, 360)`).
pub fn convert_u_v_to_wdir(u: f64, v: f64) -> f64 {
    if is_bad(u) || is_bad(v) {
        return BAD;
    }
    rescale_deg(u.atan2(v).to_degrees() + 180.0, 0.0, 360.0)
}

/// Signed difference `a - b` between two angles, in `[-180, 180)`.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    if is_bad(a) || is_bad(b) {
        return BAD;
    }
    rescale_deg(a - b, -180.0, 180.0)
}

fn rescale_deg(deg: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    let d = (deg - lo).rem_euclid(span) + lo;
    if d >= hi { d - span } else { d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wind_speed() {
        assert_relative_eq!(convert_u_v_to_wind(3.0, 4.0), 5.0);
        assert!(is_bad(convert_u_v_to_wind(f64::NAN, 4.0)));
    }

    #[test]
    fn test_wind_direction_cardinal() {
        // Southerly wind (blowing toward north) comes from 180.
        assert_relative_eq!(convert_u_v_to_wdir(0.0, 5.0), 180.0, epsilon = 1e-9);
        // Westerly wind (blowing toward east) comes from 270.
        assert_relative_eq!(convert_u_v_to_wdir(5.0, 0.0), 270.0, epsilon = 1e-9);
        // Northerly comes from 0.
        assert_relative_eq!(convert_u_v_to_wdir(0.0, -5.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert_relative_eq!(angle_difference(10.0, 350.0), 20.0, epsilon = 1e-9);
        assert_relative_eq!(angle_difference(350.0, 10.0), -20.0, epsilon = 1e-9);
        assert_relative_eq!(angle_difference(90.0, 90.0), 0.0);
    }
}
