//! Kubernetes style resource quantities (`500m`, `2`, `128Mi`, `1Gi`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("invalid quantity: {0}")]
pub struct QuantityError(pub String);

const SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("m", 0.001),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
];

/// Parsed quantity, keeps its original notation for rendering
#[derive(Debug, Clone)]
pub struct Quantity {
    raw: String,
    value: f64,
}

impl Quantity {
    /// amount expressed in base units (bytes, cores)
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// build from number and unit suffix, e.g. `(256, "Mi")`
    pub fn with_unit(amount: i64, unit: &str) -> Result<Self, QuantityError> {
        format!("{amount}{unit}").parse()
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QuantityError(s.to_owned()));
        }

        let (number, multiplier) = SUFFIXES
            .iter()
            .find_map(|(suffix, multiplier)| {
                trimmed
                    .strip_suffix(suffix)
                    .map(|number| (number, *multiplier))
            })
            .unwrap_or((trimmed, 1.0));

        let number: f64 = number
            .parse()
            .map_err(|_| QuantityError(s.to_owned()))?;
        if number.is_sign_negative() {
            return Err(QuantityError(s.to_owned()));
        }

        Ok(Self {
            raw: trimmed.to_owned(),
            value: number * multiplier,
        })
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// true if `candidate` asks for more than `current`; unparsable values never widen
pub fn is_wider(current: &str, candidate: &str) -> bool {
    match (current.parse::<Quantity>(), candidate.parse::<Quantity>()) {
        (Ok(current), Ok(candidate)) => candidate > current,
        (Err(_), Ok(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_parse_binary_and_decimal() {
        let q: Quantity = "1Gi".parse().expect("parse");
        assert_eq!(q.value(), 1024.0 * 1024.0 * 1024.0);

        let q: Quantity = "500m".parse().expect("parse");
        assert_eq!(q.value(), 0.5);

        let q: Quantity = "2".parse().expect("parse");
        assert_eq!(q.value(), 2.0);

        assert!("".parse::<Quantity>().is_err());
        assert!("Gi".parse::<Quantity>().is_err());
        assert!("-1Gi".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_compare_across_units() {
        let small: Quantity = "512Mi".parse().expect("parse");
        let large: Quantity = "1Gi".parse().expect("parse");
        assert!(large > small);
        assert_eq!(
            "1024Mi".parse::<Quantity>().expect("parse"),
            large
        );
    }

    #[test]
    fn test_is_wider() {
        assert!(is_wider("1Gi", "2Gi"));
        assert!(!is_wider("2Gi", "1Gi"));
        assert!(!is_wider("1Gi", "1024Mi"));
        assert!(is_wider("", "1Gi"));
        assert!(!is_wider("1Gi", "garbage"));
    }
}
