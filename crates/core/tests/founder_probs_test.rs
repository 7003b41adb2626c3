//! End-to-end founder probabilities on simulated four-way RIL populations.

mod common;

use approx::assert_relative_eq;
use mpprob_core::prob::{
    call_block, call_founders, FounderCallMatrix, FounderProbBuilder, FounderProbs, PositionKind,
    Strategy,
};
use mpprob_core::{ErrorKind, MpError};

fn run(
    pop: &common::Population,
    strategy: Strategy,
    step: f64,
    include_markers: bool,
) -> FounderProbs {
    FounderProbBuilder::new(&pop.cross)
        .strategy(strategy)
        .step(step)
        .include_markers(include_markers)
        .build()
        .unwrap()
        .run()
        .unwrap()
}

/// Element-wise equality with NaN equal to NaN.
fn same_values(a: &nalgebra::DMatrix<f64>, b: &nalgebra::DMatrix<f64>) -> bool {
    a.shape() == b.shape()
        && a.iter().zip(b.iter()).all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
}

fn assert_blocks_valid(result: &FounderProbs) {
    for probs in result.probabilities.values() {
        for row in 0..probs.n_individuals() {
            for pos in 0..probs.n_positions() {
                let block = probs.block(row, pos);
                if block.iter().all(|v| v.is_nan()) {
                    continue;
                }
                assert!(block.iter().all(|v| (0.0..=1.0 + 1e-9).contains(v)));
                assert_relative_eq!(block.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn test_step_zero_gives_marker_columns() {
    let pop = common::population(7, 12, false);
    for include in [true, false] {
        let result = run(&pop, Strategy::Multipoint, 0.0, include);
        for chr in ["1", "2"] {
            let p = &result.probabilities[chr];
            assert_eq!(p.values().ncols(), 11 * 4);
            assert!(p.positions().iter().all(|g| g.kind == PositionKind::Marker));
            assert_eq!(p.column_labels()[4], format!("c{}m1, Founder 1", chr));
        }
        assert_blocks_valid(&result);
    }
}

#[test]
fn test_step_ten_collapses_into_markers() {
    let pop = common::population(11, 8, false);
    let result = run(&pop, Strategy::Multipoint, 10.0, true);
    let p = &result.probabilities["1"];
    assert_eq!(p.n_positions(), 11);
    assert!(p.positions().iter().all(|g| g.kind == PositionKind::Marker));

    let stripped = run(&pop, Strategy::Multipoint, 10.0, false);
    let q = &stripped.probabilities["1"];
    assert_eq!(q.n_positions(), 11);
    assert_eq!(q.positions()[3].name, "loc30");
    assert!(q.positions().iter().all(|g| g.kind == PositionKind::Step));
    // Same positions, so the same numbers.
    assert!(same_values(p.values(), q.values()));
}

#[test]
fn test_grid_consistency_across_strategies() {
    let pop = common::population(3, 10, false);
    let cases = [
        (Strategy::Internal, 5.0, true, 21),
        (Strategy::Internal, 5.0, false, 21),
        (Strategy::Internal, -1.0, true, 10),
        (Strategy::Multipoint, 2.5, true, 41),
        (Strategy::Multipoint, -1.0, false, 10),
        (Strategy::Haplotype, 0.0, true, 10),
        (Strategy::Haplotype, 5.0, true, 10),
    ];
    for (strategy, step, include, expected) in cases {
        let result = run(&pop, strategy, step, include);
        for chr in ["1", "2"] {
            let p = &result.probabilities[chr];
            assert_eq!(
                p.n_positions(),
                expected,
                "{} step {} include {}",
                strategy,
                step,
                include
            );
            assert_eq!(p.values().ncols(), expected * 4);
            assert_eq!(result.calls[chr].n_positions(), expected);
        }
        assert_blocks_valid(&result);
    }
}

#[test]
fn test_single_marker_chromosome_uses_allele_lookup() {
    let pop = common::population(5, 10, false);
    for strategy in Strategy::ALL {
        let result = run(&pop, strategy, 5.0, false);
        let p = &result.probabilities["3"];
        assert_eq!(p.n_positions(), 1);
        assert_eq!(p.positions()[0].name, "s1");
        for row in 0..p.n_individuals() {
            let block = p.block(row, 0);
            if block[0].is_nan() {
                continue;
            }
            // Allele 1 is carried by A and D, allele 0 by B and C.
            assert!(
                block == vec![0.5, 0.0, 0.0, 0.5] || block == vec![0.0, 0.5, 0.5, 0.0],
                "{:?}",
                block
            );
        }
    }
}

#[test]
fn test_ungenotyped_line_is_undefined() {
    let pop = common::population(9, 6, false);
    let result = run(&pop, Strategy::Multipoint, 5.0, true);
    let last = 5;
    for (chr, probs) in &result.probabilities {
        assert!((0..probs.n_positions()).all(|q| probs.get(last, q, 0).is_nan()), "{}", chr);
        assert!(result.calls[chr].row(last).iter().all(|c| c.is_none()));
    }
}

#[test]
fn test_informative_calls_recover_truth() {
    let pop = common::population(21, 15, true);
    for strategy in [Strategy::Internal, Strategy::Multipoint] {
        let result = run(&pop, strategy, 0.0, true);
        for (c, chr) in ["1", "2"].iter().enumerate() {
            let calls = &result.calls[*chr];
            for line in 0..15 {
                let called: Vec<Option<usize>> = calls.row(line);
                let expected: Vec<Option<usize>> =
                    pop.truth[c][line].iter().map(|&f| Some(f + 1)).collect();
                assert_eq!(called, expected, "{} chromosome {} line {}", strategy, chr, line);
            }
        }
    }
}

#[test]
fn test_threshold_examples() {
    assert_eq!(call_block(&[0.75, 0.10, 0.10, 0.05], 0.7), Some(1));
    assert_eq!(call_block(&[0.4, 0.3, 0.2, 0.1], 0.7), None);
}

#[test]
fn test_calls_idempotent_and_monotone() {
    let pop = common::population(13, 12, false);
    let result = run(&pop, Strategy::Multipoint, 5.0, true);
    let thresholds = [0.2, 0.4, 0.6, 0.7, 0.9, 0.99, 1.0];
    for probs in result.probabilities.values() {
        let mut previous: Option<FounderCallMatrix> = None;
        for &t in &thresholds {
            let calls = call_founders(probs, t).unwrap();
            assert_eq!(calls, call_founders(probs, t).unwrap());
            if let Some(prev) = &previous {
                for row in 0..calls.n_individuals() {
                    for pos in 0..calls.n_positions() {
                        match (prev.get(row, pos), calls.get(row, pos)) {
                            (None, Some(_)) => panic!("call appeared at threshold {}", t),
                            (Some(a), Some(b)) => assert_eq!(a, b),
                            _ => {}
                        }
                    }
                }
            }
            previous = Some(calls);
        }
    }

    let before = result.calls.clone();
    let rethresholded = result.clone().with_threshold(0.9).unwrap().with_threshold(0.7).unwrap();
    assert_eq!(rethresholded.calls, before);
    assert!(same_values(
        rethresholded.probabilities["1"].values(),
        result.probabilities["1"].values()
    ));
}

#[test]
fn test_kosambi_differs_from_haldane() {
    let pop = common::population(17, 6, false);
    let haldane = run(&pop, Strategy::Multipoint, 5.0, false);
    let kosambi = FounderProbBuilder::new(&pop.cross)
        .step(5.0)
        .include_markers(false)
        .map_function("kosambi".parse().unwrap())
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(kosambi.metadata.map_function.to_string(), "kosambi");
    assert!(!same_values(haldane.probabilities["1"].values(), kosambi.probabilities["1"].values()));
}

#[test]
fn test_mixed_designs_rejected_by_multipoint_only() {
    use mpprob_core::data::MpCross;
    use mpprob_core::genetics::{Pedigree, PedigreeEntry};

    let pop = common::population(1, 2, false);
    // Line L2 gets an extra generation of intercrossing with an unrelated funnel.
    let ped = Pedigree::from_entries(&[
        PedigreeEntry::founder("A"),
        PedigreeEntry::founder("B"),
        PedigreeEntry::founder("C"),
        PedigreeEntry::founder("D"),
        PedigreeEntry::cross("AB", "A", "B"),
        PedigreeEntry::cross("CD", "C", "D"),
        PedigreeEntry::cross("AB2", "A", "B"),
        PedigreeEntry::cross("CD2", "C", "D"),
        PedigreeEntry::cross("X1", "AB", "CD"),
        PedigreeEntry::cross("X2", "AB2", "CD2"),
        PedigreeEntry::cross("L1", "X1", "X1"),
        PedigreeEntry::cross("Y", "X1", "X2"),
        PedigreeEntry::cross("L2", "Y", "Y"),
    ])
    .unwrap();
    let cross = MpCross::new(
        pop.cross.founders().clone(),
        pop.cross.finals().clone(),
        ped,
        pop.cross.map().clone(),
    )
    .unwrap();

    let err = FounderProbBuilder::new(&cross).build().err().unwrap();
    assert!(matches!(err, MpError::MixedDesign { .. }));
    assert_eq!(err.kind(), ErrorKind::InputConsistency);

    // The flanking-marker strategy models each line under its own design.
    let result = FounderProbBuilder::new(&cross)
        .strategy(Strategy::Internal)
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert_blocks_valid(&result);
}

#[test]
fn test_deadline_exceeded() {
    let pop = common::population(2, 4, false);
    let err = FounderProbBuilder::new(&pop.cross)
        .deadline(std::time::Duration::ZERO)
        .build()
        .unwrap()
        .run()
        .err()
        .unwrap();
    assert!(matches!(err, MpError::DeadlineExceeded { .. }));
    assert_eq!(err.kind(), ErrorKind::Interrupted);
}

#[test]
fn test_founder_matrix_wider_than_design_rejected() {
    use mpprob_core::data::{ChromosomeMap, GeneticMap, GenotypeMatrix, MapMarker, MpCross};
    use mpprob_core::genetics::{Pedigree, PedigreeEntry};

    // Eight genotyped founders, but L1 comes from a four-way funnel of A..D.
    let names = ["A", "B", "C", "D", "E", "F", "G", "H"];
    let mut entries: Vec<PedigreeEntry> = names.iter().map(|f| PedigreeEntry::founder(f)).collect();
    entries.push(PedigreeEntry::cross("AB", "A", "B"));
    entries.push(PedigreeEntry::cross("CD", "C", "D"));
    entries.push(PedigreeEntry::cross("ABCD", "AB", "CD"));
    let mut parent = "ABCD".to_string();
    for g in 1..5 {
        let id = format!("S{}", g);
        entries.push(PedigreeEntry::cross(&id, &parent, &parent));
        parent = id;
    }
    entries.push(PedigreeEntry::cross("L1", &parent, &parent));
    let ped = Pedigree::from_entries(&entries).unwrap();

    let markers: Vec<String> = (1..=3).map(|m| format!("m{}", m)).collect();
    let mut map = GeneticMap::new();
    map.insert(
        ChromosomeMap::new(
            "1",
            markers
                .iter()
                .enumerate()
                .map(|(i, m)| MapMarker::new(m.clone(), i as f64 * 10.0))
                .collect(),
        )
        .unwrap(),
    )
    .unwrap();
    let founders = GenotypeMatrix::from_rows(
        names.iter().map(|s| s.to_string()).collect(),
        markers.clone(),
        (0..8).map(|f| vec![Some(f as i32); 3]).collect(),
    )
    .unwrap();
    let finals =
        GenotypeMatrix::from_rows(vec!["L1".to_string()], markers, vec![vec![Some(0); 3]]).unwrap();
    let cross = MpCross::new(founders, finals, ped, map).unwrap();

    for strategy in Strategy::ALL {
        let err = FounderProbBuilder::new(&cross).strategy(strategy).build().err().unwrap();
        assert!(matches!(err, MpError::Pedigree(_)), "{}: {}", strategy, err);
        assert_eq!(err.kind(), ErrorKind::InputConsistency);
    }
}
