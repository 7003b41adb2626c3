use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::MpError;

/// Conversion between genetic distance (cM) and recombination fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapFunction {
    /// No crossover interference.
    #[default]
    Haldane,
    /// Positive interference.
    Kosambi,
}

impl MapFunction {
    /// Recombination fraction for a distance of `cm` centiMorgans.
    ///
    /// The sign of `cm` is ignored; the result lies in `[0, 0.5)`.
    pub fn recombination_fraction(self, cm: f64) -> f64 {
        let d = cm.abs() / 100.0;
        match self {
            MapFunction::Haldane => 0.5 * (1.0 - (-2.0 * d).exp()),
            MapFunction::Kosambi => 0.5 * (2.0 * d).tanh(),
        }
    }

    /// Distance in cM for a recombination fraction `r` in `[0, 0.5)`.
    ///
    /// Returns infinity for `r >= 0.5`.
    pub fn distance(self, r: f64) -> f64 {
        if r >= 0.5 {
            return f64::INFINITY;
        }
        let r = r.max(0.0);
        match self {
            MapFunction::Haldane => -50.0 * (1.0 - 2.0 * r).ln(),
            MapFunction::Kosambi => 25.0 * ((1.0 + 2.0 * r) / (1.0 - 2.0 * r)).ln(),
        }
    }
}

impl fmt::Display for MapFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapFunction::Haldane => write!(f, "haldane"),
            MapFunction::Kosambi => write!(f, "kosambi"),
        }
    }
}

impl FromStr for MapFunction {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "haldane" | "h" => Ok(MapFunction::Haldane),
            "kosambi" | "k" => Ok(MapFunction::Kosambi),
            other => Err(MpError::InvalidParameter(format!(
                "Unknown map function '{}'. Use 'haldane' or 'kosambi'.",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haldane_values() {
        let h = MapFunction::Haldane;
        assert_eq!(h.recombination_fraction(0.0), 0.0);
        assert_relative_eq!(
            h.recombination_fraction(50.0),
            0.5 * (1.0 - (-1.0f64).exp()),
            epsilon = 1e-12
        );
        assert!(h.recombination_fraction(1000.0) < 0.5);
        assert_relative_eq!(h.recombination_fraction(-10.0), h.recombination_fraction(10.0));
    }

    #[test]
    fn test_kosambi_above_haldane() {
        // Interference suppresses double crossovers, so more recombinants.
        for d in [5.0, 20.0, 40.0] {
            let k = MapFunction::Kosambi.recombination_fraction(d);
            let h = MapFunction::Haldane.recombination_fraction(d);
            assert!(k > h, "d = {}: kosambi {} vs haldane {}", d, k, h);
            assert!(k < 0.5);
        }
    }

    #[test]
    fn test_inverse() {
        for mf in [MapFunction::Haldane, MapFunction::Kosambi] {
            for d in [0.1, 1.0, 12.5, 80.0] {
                let r = mf.recombination_fraction(d);
                assert_relative_eq!(mf.distance(r), d, epsilon = 1e-9);
            }
            assert!(mf.distance(0.5).is_infinite());
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("Kosambi".parse::<MapFunction>().unwrap(), MapFunction::Kosambi);
        assert_eq!("haldane".parse::<MapFunction>().unwrap(), MapFunction::Haldane);
        assert!("morgan".parse::<MapFunction>().is_err());
        assert_eq!(MapFunction::Kosambi.to_string(), "kosambi");
    }
}
