//! ZIP normalization and ZIP-prefix region lookup
//!
//! Used to synthesize a minimal location without a geocoding round trip and
//! to backfill records returned by a resolver that omitted postal/region.

use crate::types::LocationRecord;

/// Three-digit ZIP prefix ranges (inclusive) to state codes.
const ZIP3_REGIONS: &[(u16, u16, &str)] = &[
    (5, 5, "NY"),
    (6, 7, "PR"),
    (8, 8, "VI"),
    (9, 9, "PR"),
    (10, 27, "MA"),
    (28, 29, "RI"),
    (30, 38, "NH"),
    (39, 49, "ME"),
    (50, 54, "VT"),
    (55, 55, "MA"),
    (56, 59, "VT"),
    (60, 69, "CT"),
    (70, 89, "NJ"),
    (100, 149, "NY"),
    (150, 196, "PA"),
    (197, 199, "DE"),
    (200, 200, "DC"),
    (201, 201, "VA"),
    (202, 205, "DC"),
    (206, 219, "MD"),
    (220, 246, "VA"),
    (247, 268, "WV"),
    (270, 289, "NC"),
    (290, 299, "SC"),
    (300, 319, "GA"),
    (320, 339, "FL"),
    (341, 349, "FL"),
    (350, 369, "AL"),
    (370, 385, "TN"),
    (386, 397, "MS"),
    (398, 399, "GA"),
    (400, 427, "KY"),
    (430, 459, "OH"),
    (460, 479, "IN"),
    (480, 499, "MI"),
    (500, 528, "IA"),
    (530, 549, "WI"),
    (550, 567, "MN"),
    (569, 569, "DC"),
    (570, 577, "SD"),
    (580, 588, "ND"),
    (590, 599, "MT"),
    (600, 629, "IL"),
    (630, 658, "MO"),
    (660, 679, "KS"),
    (680, 693, "NE"),
    (700, 714, "LA"),
    (716, 729, "AR"),
    (730, 749, "OK"),
    (750, 799, "TX"),
    (800, 816, "CO"),
    (820, 831, "WY"),
    (832, 838, "ID"),
    (840, 847, "UT"),
    (850, 865, "AZ"),
    (870, 884, "NM"),
    (885, 885, "TX"),
    (889, 898, "NV"),
    (900, 961, "CA"),
    (967, 968, "HI"),
    (969, 969, "GU"),
    (970, 979, "OR"),
    (980, 994, "WA"),
    (995, 999, "AK"),
];

/// Normalize input that is exactly a ZIP code to five digits.
///
/// Accepts `12345`, `12345-6789` and `123456789` after trimming. Anything
/// else, including a street address that starts with five digits, is `None`.
#[must_use]
pub fn normalize_zip(input: &str) -> Option<String> {
    let input = input.trim();
    let (head, tail) = match input.split_once('-') {
        Some((head, tail)) if tail.len() == 4 => (head, tail),
        Some(_) => return None,
        None if input.len() == 9 && input.is_char_boundary(5) => input.split_at(5),
        None => (input, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    (head.len() == 5 && all_digits(head) && all_digits(tail)).then(|| head.to_string())
}

/// Find the ZIP code inside a free-form address.
///
/// Takes the last standalone ZIP token. The leading token is skipped unless
/// it is the whole input, so a five-digit street number never counts.
#[must_use]
pub fn zip_in_address(input: &str) -> Option<String> {
    if let Some(zip) = normalize_zip(input) {
        return Some(zip);
    }
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .skip(1)
        .filter_map(normalize_zip)
        .last()
}

/// Look up the state code for a (normalized or raw) ZIP.
#[must_use]
pub fn region_for_zip(zip: &str) -> Option<&'static str> {
    let zip = normalize_zip(zip)?;
    let prefix: u16 = zip[..3].parse().ok()?;
    ZIP3_REGIONS
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&prefix))
        .map(|(_, _, region)| *region)
}

/// Build a minimal location record from a bare ZIP (no geocoding).
#[must_use]
pub fn minimal_location(zip: &str) -> Option<LocationRecord> {
    let postal_code = normalize_zip(zip)?;
    Some(LocationRecord {
        region: region_for_zip(&postal_code).map(str::to_string),
        postal_code: Some(postal_code),
        synthesized: true,
        ..LocationRecord::default()
    })
}

/// Fill postal/region fields a resolver left empty.
#[must_use]
pub fn backfill(mut record: LocationRecord, raw_input: &str) -> LocationRecord {
    if record.postal_code.is_none() {
        record.postal_code = zip_in_address(raw_input);
    }
    if record.region.is_none() {
        record.region = record
            .postal_code
            .as_deref()
            .and_then(region_for_zip)
            .map(str::to_string);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_plain_and_plus_four() {
        assert_eq!(normalize_zip("94105"), Some("94105".to_string()));
        assert_eq!(normalize_zip(" 94105-1234 "), Some("94105".to_string()));
        assert_eq!(normalize_zip("941"), None);
        assert_eq!(normalize_zip("San Francisco"), None);
        assert_eq!(normalize_zip("941051234"), Some("94105".to_string()));
        assert_eq!(normalize_zip("94105-12"), None);
    }

    #[test]
    fn street_number_is_not_a_zip() {
        assert_eq!(normalize_zip("10250 Santa Monica Blvd"), None);
        assert_eq!(normalize_zip("12345 Main Street"), None);
        assert_eq!(minimal_location("10250 Santa Monica Blvd"), None);
    }

    #[test]
    fn zip_found_at_end_of_address() {
        assert_eq!(
            zip_in_address("10250 Santa Monica Blvd, Los Angeles, CA 90067"),
            Some("90067".to_string())
        );
        assert_eq!(
            zip_in_address("1 Market St, San Francisco, CA 94105-1234"),
            Some("94105".to_string())
        );
        assert_eq!(zip_in_address("10250 Santa Monica Blvd, Los Angeles"), None);
        assert_eq!(zip_in_address(" 94105 "), Some("94105".to_string()));
    }

    #[test]
    fn backfill_ignores_street_number() {
        let record = LocationRecord {
            formatted_address: Some("10250 Santa Monica Blvd, Los Angeles".into()),
            ..LocationRecord::default()
        };
        let filled = backfill(record, "10250 Santa Monica Blvd, Los Angeles");
        assert_eq!(filled.postal_code, None);
        assert_eq!(filled.region, None);

        let record = LocationRecord {
            formatted_address: Some("10250 Santa Monica Blvd".into()),
            ..LocationRecord::default()
        };
        let filled = backfill(record, "10250 Santa Monica Blvd, Los Angeles, CA 90067");
        assert_eq!(filled.postal_code.as_deref(), Some("90067"));
        assert_eq!(filled.region.as_deref(), Some("CA"));
    }

    #[test]
    fn region_lookup() {
        assert_eq!(region_for_zip("94105"), Some("CA"));
        assert_eq!(region_for_zip("10001"), Some("NY"));
        assert_eq!(region_for_zip("78701"), Some("TX"));
        assert_eq!(region_for_zip("02108"), Some("MA"));
        assert_eq!(region_for_zip("00000"), None);
    }

    #[test]
    fn minimal_location_from_zip() {
        let loc = minimal_location("94105").unwrap();
        assert_eq!(loc.postal_code.as_deref(), Some("94105"));
        assert_eq!(loc.region.as_deref(), Some("CA"));
        assert!(loc.synthesized);
        assert!(!loc.has_address());
    }

    #[test]
    fn backfill_keeps_resolver_fields() {
        let record = LocationRecord {
            region: Some("NV".into()),
            formatted_address: Some("1 Main St".into()),
            ..LocationRecord::default()
        };
        let filled = backfill(record, "94105");
        assert_eq!(filled.postal_code.as_deref(), Some("94105"));
        assert_eq!(filled.region.as_deref(), Some("NV"));
    }
}
