use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{MpError, Result};

/// Number of founders in a funnel design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FounderCount {
    Four,
    Eight,
}

impl FounderCount {
    /// # Errors
    /// Returns `UnsupportedDesign` for anything other than 4 or 8 founders.
    pub fn from_count(n: usize) -> Result<Self> {
        match n {
            4 => Ok(FounderCount::Four),
            8 => Ok(FounderCount::Eight),
            other => Err(MpError::UnsupportedDesign(format!(
                "{} founders; only 4- and 8-way designs are supported",
                other
            ))),
        }
    }

    pub fn n(self) -> usize {
        match self {
            FounderCount::Four => 4,
            FounderCount::Eight => 8,
        }
    }

    /// Generations of crossing needed to combine all founders in one funnel.
    pub fn funnel_generations(self) -> u32 {
        match self {
            FounderCount::Four => 2,
            FounderCount::Eight => 3,
        }
    }
}

/// Mating system used after the founders have been mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mating {
    Selfing,
    Sib,
}

/// Inbreeding stage of a design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inbreeding {
    /// Genotyped directly after mixing, no inbreeding generations.
    Outbred,
    Selfing(u32),
    Sib(u32),
}

impl Inbreeding {
    pub fn generations(self) -> u32 {
        match self {
            Inbreeding::Outbred => 0,
            Inbreeding::Selfing(k) | Inbreeding::Sib(k) => k,
        }
    }

    pub fn mating(self) -> Option<Mating> {
        match self {
            Inbreeding::Outbred => None,
            Inbreeding::Selfing(_) => Some(Mating::Selfing),
            Inbreeding::Sib(_) => Some(Mating::Sib),
        }
    }
}

/// A multi-parent breeding design.
///
/// Rendered as `<n>wayG<g>aic<a>` followed by an optional inbreeding suffix
/// `self<k>` or `sib<k>`, e.g. `8wayG3aic1self5`. `g` is the number of funnel
/// generations and is implied by the founder count; `a` is the number of
/// generations of advanced intercrossing after the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Design {
    pub founders: FounderCount,
    pub intercross: u32,
    pub inbreeding: Inbreeding,
}

impl Design {
    pub fn new(founders: FounderCount, intercross: u32, inbreeding: Inbreeding) -> Self {
        Self {
            founders,
            intercross,
            inbreeding,
        }
    }

    pub fn n_founders(&self) -> usize {
        self.founders.n()
    }

    pub fn funnel_generations(&self) -> u32 {
        self.founders.funnel_generations()
    }

    /// All generations of meiosis from the founders to the final lines.
    pub fn total_generations(&self) -> u32 {
        self.funnel_generations() + self.intercross + self.inbreeding.generations()
    }

    /// The label with the inbreeding suffix removed.
    pub fn base_label(&self) -> String {
        format!(
            "{}wayG{}aic{}",
            self.n_founders(),
            self.funnel_generations(),
            self.intercross
        )
    }

    /// The recombinant-inbred cross type used by the multipoint strategy.
    ///
    /// # Errors
    /// Returns `UnsupportedDesign` for designs with intercross generations or
    /// without inbreeding, which have no recombinant-inbred counterpart.
    pub fn cross_spec(&self) -> Result<CrossSpec> {
        if self.intercross > 0 {
            return Err(MpError::UnsupportedDesign(format!(
                "'{}': advanced intercross designs have no recombinant-inbred cross type",
                self
            )));
        }
        let cross_type = match (self.founders, self.inbreeding) {
            (FounderCount::Four, Inbreeding::Selfing(_)) => CrossType::Ri4Self,
            (FounderCount::Four, Inbreeding::Sib(_)) => CrossType::Ri4Sib,
            (FounderCount::Eight, Inbreeding::Selfing(_)) => CrossType::Ri8Self,
            (FounderCount::Eight, Inbreeding::Sib(_)) => CrossType::Ri8Sib,
            (_, Inbreeding::Outbred) => {
                return Err(MpError::UnsupportedDesign(format!(
                    "'{}': lines without inbreeding generations have no \
                     recombinant-inbred cross type",
                    self
                )))
            }
        };
        Ok(CrossSpec {
            cross_type,
            generations: self.inbreeding.generations(),
        })
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_label())?;
        match self.inbreeding {
            Inbreeding::Outbred => Ok(()),
            Inbreeding::Selfing(k) => write!(f, "self{}", k),
            Inbreeding::Sib(k) => write!(f, "sib{}", k),
        }
    }
}

impl FromStr for Design {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || MpError::UnsupportedDesign(format!("cannot parse design label '{}'", s));

        let (n, rest) = s.split_once("wayG").ok_or_else(bad)?;
        let founders = FounderCount::from_count(n.parse().map_err(|_| bad())?)?;

        let (g, rest) = rest.split_once("aic").ok_or_else(bad)?;
        let g: u32 = g.parse().map_err(|_| bad())?;
        if g != founders.funnel_generations() {
            return Err(MpError::UnsupportedDesign(format!(
                "'{}': a {}-way funnel takes {} generations, not {}",
                s,
                founders.n(),
                founders.funnel_generations(),
                g
            )));
        }

        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        let intercross: u32 = rest[..digits].parse().map_err(|_| bad())?;
        let suffix = &rest[digits..];

        let inbreeding = if suffix.is_empty() {
            Inbreeding::Outbred
        } else if let Some(k) = suffix.strip_prefix("self") {
            Inbreeding::Selfing(k.parse().map_err(|_| bad())?)
        } else if let Some(k) = suffix.strip_prefix("sib") {
            Inbreeding::Sib(k.parse().map_err(|_| bad())?)
        } else {
            return Err(bad());
        };

        Ok(Design::new(founders, intercross, inbreeding))
    }
}

impl Serialize for Design {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Recombinant-inbred cross types understood by the multipoint strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossType {
    Ri4Self,
    Ri4Sib,
    Ri8Self,
    Ri8Sib,
}

impl CrossType {
    pub fn n_founders(self) -> usize {
        match self {
            CrossType::Ri4Self | CrossType::Ri4Sib => 4,
            CrossType::Ri8Self | CrossType::Ri8Sib => 8,
        }
    }

    pub fn mating(self) -> Mating {
        match self {
            CrossType::Ri4Self | CrossType::Ri8Self => Mating::Selfing,
            CrossType::Ri4Sib | CrossType::Ri8Sib => Mating::Sib,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CrossType::Ri4Self => "ri4self",
            CrossType::Ri4Sib => "ri4sib",
            CrossType::Ri8Self => "ri8self",
            CrossType::Ri8Sib => "ri8sib",
        }
    }
}

/// A cross type together with its number of inbreeding generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrossSpec {
    pub cross_type: CrossType,
    pub generations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip_cases() {
        let d = Design::new(FounderCount::Eight, 1, Inbreeding::Selfing(5));
        assert_eq!(d.to_string(), "8wayG3aic1self5");
        assert_eq!(d.base_label(), "8wayG3aic1");
        assert_eq!("8wayG3aic1self5".parse::<Design>().unwrap(), d);

        let d: Design = "4wayG2aic0".parse().unwrap();
        assert_eq!(d.inbreeding, Inbreeding::Outbred);
        assert_eq!(d.n_founders(), 4);

        let d: Design = "4wayG2aic2sib10".parse().unwrap();
        assert_eq!(d.inbreeding, Inbreeding::Sib(10));
        assert_eq!(d.intercross, 2);
    }

    #[test]
    fn test_bad_labels() {
        assert!("4way".parse::<Design>().is_err());
        assert!("6wayG3aic0".parse::<Design>().is_err());
        assert!("4wayG3aic0".parse::<Design>().is_err());
        assert!("4wayG2aic0bc2".parse::<Design>().is_err());
        assert!("4wayG2aicXself2".parse::<Design>().is_err());
    }

    #[test]
    fn test_total_generations() {
        let d = Design::new(FounderCount::Four, 1, Inbreeding::Selfing(6));
        assert_eq!(d.total_generations(), 9);
    }

    #[test]
    fn test_cross_spec() {
        let d = Design::new(FounderCount::Eight, 0, Inbreeding::Sib(20));
        let spec = d.cross_spec().unwrap();
        assert_eq!(spec.cross_type, CrossType::Ri8Sib);
        assert_eq!(spec.generations, 20);
        assert_eq!(spec.cross_type.label(), "ri8sib");

        let aic = Design::new(FounderCount::Four, 1, Inbreeding::Selfing(3));
        assert!(matches!(aic.cross_spec(), Err(MpError::UnsupportedDesign(_))));

        let outbred = Design::new(FounderCount::Four, 0, Inbreeding::Outbred);
        assert!(outbred.cross_spec().is_err());
    }

    #[test]
    fn test_serialize_as_label() {
        let d = Design::new(FounderCount::Four, 0, Inbreeding::Selfing(3));
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"4wayG2aic0self3\"");
    }
}
