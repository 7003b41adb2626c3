use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{MpError, Result};

/// A marker placed on the genetic map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub name: String,
    /// Genetic position in centiMorgans.
    pub position: f64,
}

impl MapMarker {
    pub fn new(name: impl Into<String>, position: f64) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// The ordered markers of one chromosome.
///
/// Positions are non-decreasing. A chromosome with a single marker is a valid
/// degenerate case: no interpolation is possible on it.
#[derive(Debug, Clone, Serialize)]
pub struct ChromosomeMap {
    name: String,
    markers: Vec<MapMarker>,
}

impl ChromosomeMap {
    /// # Errors
    /// Returns an error if the chromosome is empty, a position is not finite,
    /// or positions decrease.
    pub fn new(name: impl Into<String>, markers: Vec<MapMarker>) -> Result<Self> {
        let name = name.into();
        if markers.is_empty() {
            return Err(MpError::Data(format!("Chromosome '{}' has no markers", name)));
        }
        for m in &markers {
            if !m.position.is_finite() {
                return Err(MpError::Data(format!(
                    "Marker '{}' on chromosome '{}' has a non-finite position",
                    m.name, name
                )));
            }
        }
        for w in markers.windows(2) {
            if w[1].position < w[0].position {
                return Err(MpError::Data(format!(
                    "Chromosome '{}' is not sorted: '{}' ({}) follows '{}' ({})",
                    name, w[1].name, w[1].position, w[0].name, w[0].position
                )));
            }
        }
        Ok(Self { name, markers })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn markers(&self) -> &[MapMarker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn is_single_marker(&self) -> bool {
        self.markers.len() == 1
    }

    pub fn positions(&self) -> Vec<f64> {
        self.markers.iter().map(|m| m.position).collect()
    }

    pub fn min_position(&self) -> f64 {
        self.markers[0].position
    }

    pub fn max_position(&self) -> f64 {
        self.markers[self.markers.len() - 1].position
    }

    /// Map length in cM.
    pub fn length(&self) -> f64 {
        self.max_position() - self.min_position()
    }
}

/// A genetic map: chromosomes in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneticMap {
    chromosomes: IndexMap<String, ChromosomeMap>,
}

impl GeneticMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chromosome.
    ///
    /// # Errors
    /// Returns an error if a chromosome with the same name already exists, or
    /// if one of its markers is already placed elsewhere on the map.
    pub fn insert(&mut self, chromosome: ChromosomeMap) -> Result<()> {
        if self.chromosomes.contains_key(chromosome.name()) {
            return Err(MpError::Data(format!(
                "Chromosome '{}' appears twice in the map",
                chromosome.name()
            )));
        }
        for m in chromosome.markers() {
            if let Some(other) = self.chromosome_of(&m.name) {
                return Err(MpError::Data(format!(
                    "Marker '{}' is placed on both '{}' and '{}'",
                    m.name,
                    other,
                    chromosome.name()
                )));
            }
        }
        self.chromosomes
            .insert(chromosome.name().to_string(), chromosome);
        Ok(())
    }

    /// Build a map from `(marker, chromosome, position)` records.
    ///
    /// Chromosomes keep their order of first appearance; markers are sorted by
    /// position within a chromosome (ties keep input order).
    pub fn from_records(records: Vec<(String, String, f64)>) -> Result<Self> {
        let mut grouped: IndexMap<String, Vec<MapMarker>> = IndexMap::new();
        for (marker, chrom, pos) in records {
            grouped
                .entry(chrom)
                .or_default()
                .push(MapMarker::new(marker, pos));
        }

        let mut map = GeneticMap::new();
        for (chrom, mut markers) in grouped {
            markers.sort_by(|a, b| a.position.total_cmp(&b.position));
            map.insert(ChromosomeMap::new(chrom, markers)?)?;
        }
        Ok(map)
    }

    pub fn get(&self, chromosome: &str) -> Option<&ChromosomeMap> {
        self.chromosomes.get(chromosome)
    }

    pub fn chromosome_names(&self) -> Vec<&str> {
        self.chromosomes.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChromosomeMap> {
        self.chromosomes.values()
    }

    pub fn n_chromosomes(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn n_markers(&self) -> usize {
        self.chromosomes.values().map(|c| c.len()).sum()
    }

    fn chromosome_of(&self, marker: &str) -> Option<&str> {
        self.chromosomes
            .values()
            .find(|c| c.markers().iter().any(|m| m.name == marker))
            .map(|c| c.name())
    }
}
