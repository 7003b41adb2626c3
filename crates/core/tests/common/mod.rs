//! Synthetic four-founder RIL populations for integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mpprob_core::data::{ChromosomeMap, GeneticMap, GenotypeMatrix, MapMarker, MpCross};
use mpprob_core::genetics::{Pedigree, PedigreeEntry};

pub const FOUNDERS: [&str; 4] = ["A", "B", "C", "D"];

/// A simulated population with its true founder of origin.
pub struct Population {
    pub cross: MpCross,
    /// `truth[chromosome][line][marker]`, 0-based founder index.
    pub truth: Vec<Vec<Vec<usize>>>,
}

/// Funnel ABCD followed by six generations of selfing per line.
pub fn pedigree(n_lines: usize) -> Pedigree {
    let mut entries: Vec<PedigreeEntry> =
        FOUNDERS.iter().map(|f| PedigreeEntry::founder(f)).collect();
    entries.push(PedigreeEntry::cross("AB", "A", "B"));
    entries.push(PedigreeEntry::cross("CD", "C", "D"));
    entries.push(PedigreeEntry::cross("ABCD", "AB", "CD"));
    for line in 1..=n_lines {
        let mut parent = "ABCD".to_string();
        for g in 1..6 {
            let id = format!("L{}_S{}", line, g);
            entries.push(PedigreeEntry::cross(&id, &parent, &parent));
            parent = id;
        }
        entries.push(PedigreeEntry::cross(&format!("L{}", line), &parent, &parent));
    }
    Pedigree::from_entries(&entries).unwrap()
}

/// Chromosomes "1" and "2" with 11 markers each at 0, 10, ..., 100 cM, and
/// chromosome "3" with a single marker.
pub fn map() -> GeneticMap {
    let mut map = GeneticMap::new();
    for chr in 1..=2 {
        let markers = (0..11)
            .map(|i| MapMarker::new(format!("c{}m{}", chr, i), i as f64 * 10.0))
            .collect();
        map.insert(ChromosomeMap::new(chr.to_string(), markers).unwrap())
            .unwrap();
    }
    map.insert(ChromosomeMap::new("3", vec![MapMarker::new("s1", 0.0)]).unwrap())
        .unwrap();
    map
}

/// Simulate `n_lines` lines.
///
/// With `informative` set, founder `k` carries allele `k` at every marker and
/// no call is missing; otherwise markers are biallelic and 5% of calls are
/// missing. The last line is entirely ungenotyped unless `informative`.
pub fn population(seed: u64, n_lines: usize, informative: bool) -> Population {
    let mut rng = StdRng::seed_from_u64(seed);
    let map = map();

    let mut marker_names = Vec::new();
    let mut founder_rows = vec![Vec::new(); 4];
    for chr in map.iter() {
        for marker in chr.markers() {
            marker_names.push(marker.name.clone());
            for (f, row) in founder_rows.iter_mut().enumerate() {
                let allele = if chr.is_single_marker() {
                    // Founders A and D share allele 1.
                    i32::from(f == 0 || f == 3)
                } else if informative {
                    f as i32
                } else {
                    rng.gen_range(0..2)
                };
                row.push(Some(allele));
            }
        }
    }

    let mut final_rows = vec![Vec::new(); n_lines];
    let mut truth = Vec::new();
    let mut column = 0;
    for chr in map.iter() {
        let mut chr_truth = Vec::new();
        for (line, row) in final_rows.iter_mut().enumerate() {
            let mut origin = rng.gen_range(0..4);
            let mut line_truth = Vec::new();
            for m in 0..chr.len() {
                if m > 0 && rng.gen_bool(0.1) {
                    origin = rng.gen_range(0..4);
                }
                line_truth.push(origin);
                let silent = !informative && (line + 1 == n_lines || rng.gen_bool(0.05));
                row.push(if silent {
                    None
                } else {
                    founder_rows[origin][column + m]
                });
            }
            chr_truth.push(line_truth);
        }
        column += chr.len();
        truth.push(chr_truth);
    }

    let founders = GenotypeMatrix::from_rows(
        FOUNDERS.iter().map(|s| s.to_string()).collect(),
        marker_names.clone(),
        founder_rows,
    )
    .unwrap();
    let finals = GenotypeMatrix::from_rows(
        (1..=n_lines).map(|i| format!("L{}", i)).collect(),
        marker_names,
        final_rows,
    )
    .unwrap();

    Population {
        cross: MpCross::new(founders, finals, pedigree(n_lines), map).unwrap(),
        truth,
    }
}
