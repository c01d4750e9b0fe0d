//! Load band classification.

use crate::error::ValueOutOfRange;
use crate::models::LoadBand;

/// Values strictly below this bound are Green.
///
/// The good-moment signal is derived from this same boundary.
pub const GREEN_UPPER_BOUND: f64 = 34.0;

/// Values strictly above this bound are Red.
pub const RED_LOWER_BOUND: f64 = 66.0;

/// Lowest valid load value.
pub const MIN_LOAD: f64 = 0.0;

/// Highest valid load value.
pub const MAX_LOAD: f64 = 100.0;

/// Classify a load value into its band.
///
/// Both 34 and 66 belong to Orange. Values outside [0, 100] (including NaN)
/// are rejected, never clamped.
pub fn classify(value: f64) -> Result<LoadBand, ValueOutOfRange> {
    if !(MIN_LOAD..=MAX_LOAD).contains(&value) {
        return Err(ValueOutOfRange(value));
    }

    Ok(if value < GREEN_UPPER_BOUND {
        LoadBand::Green
    } else if value <= RED_LOWER_BOUND {
        LoadBand::Orange
    } else {
        LoadBand::Red
    })
}

/// Whether a band counts as a good moment for heavy consumption.
pub fn is_good_band(band: LoadBand) -> bool {
    band == LoadBand::Green
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(33.999), Ok(LoadBand::Green));
        assert_eq!(classify(34.0), Ok(LoadBand::Orange));
        assert_eq!(classify(66.0), Ok(LoadBand::Orange));
        assert_eq!(classify(66.001), Ok(LoadBand::Red));
    }

    #[test]
    fn test_range_ends() {
        assert_eq!(classify(0.0), Ok(LoadBand::Green));
        assert_eq!(classify(100.0), Ok(LoadBand::Red));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(classify(-0.1), Err(ValueOutOfRange(-0.1)));
        assert_eq!(classify(100.01), Err(ValueOutOfRange(100.01)));
        assert!(classify(f64::NAN).is_err());
        assert!(classify(f64::INFINITY).is_err());
    }

    #[test]
    fn test_good_band_follows_green() {
        assert!(is_good_band(LoadBand::Green));
        assert!(!is_good_band(LoadBand::Orange));
        assert!(!is_good_band(LoadBand::Red));

        let just_below = GREEN_UPPER_BOUND - 1e-9;
        assert!(is_good_band(classify(just_below).unwrap()));
        assert!(!is_good_band(classify(GREEN_UPPER_BOUND).unwrap()));
    }
}
