//! Cumulative recombination during inbreeding.
//!
//! Tracks the joint origin of two linked loci through generations of selfing
//! or full-sib mating started from a cross between two haplotypes `P` and `Q`.
//! A haplotype is encoded in two bits: bit 0 is the origin at the first locus,
//! bit 1 the origin at the second.

use super::design::Mating;

/// Beyond this many generations the fixation limit is used directly.
const MAX_CHAIN_GENERATIONS: u32 = 100;

/// Probability that a random haplotype of a line carries different origins at
/// two loci with recombination fraction `r`, after `generations` generations
/// of `mating` starting from the `P x Q` cross.
///
/// Zero generations means the cross itself (no recombination yet).
pub fn recombinant_fraction(mating: Mating, generations: u32, r: f64) -> f64 {
    if generations == 0 || r <= 0.0 {
        return 0.0;
    }
    if generations > MAX_CHAIN_GENERATIONS {
        return fixation_limit(mating, r);
    }
    match mating {
        Mating::Selfing => selfing_chain(generations, r),
        Mating::Sib => sib_chain(generations, r),
    }
}

/// Recombinant fraction of fully inbred lines (Haldane & Waddington).
pub fn fixation_limit(mating: Mating, r: f64) -> f64 {
    match mating {
        Mating::Selfing => 2.0 * r / (1.0 + 2.0 * r),
        Mating::Sib => 4.0 * r / (1.0 + 6.0 * r),
    }
}

fn is_recombinant(h: usize) -> bool {
    (h & 1) != ((h >> 1) & 1)
}

/// Gamete distribution of an individual with haplotypes `h1`, `h2`.
fn gamete(h1: usize, h2: usize, r: f64) -> [f64; 4] {
    let mut g = [0.0; 4];
    g[h1] += 0.5 * (1.0 - r);
    g[h2] += 0.5 * (1.0 - r);
    g[(h1 & 1) | (h2 & 2)] += 0.5 * r;
    g[(h2 & 1) | (h1 & 2)] += 0.5 * r;
    g
}

fn selfing_chain(generations: u32, r: f64) -> f64 {
    // State: ordered haplotype pair of the individual, index h1 * 4 + h2.
    let mut p = [0.0f64; 16];
    p[3] = 1.0;

    for _ in 0..generations {
        let mut next = [0.0f64; 16];
        for (s, &ps) in p.iter().enumerate() {
            if ps == 0.0 {
                continue;
            }
            let g = gamete(s / 4, s % 4, r);
            for a in 0..4 {
                for b in 0..4 {
                    next[a * 4 + b] += ps * g[a] * g[b];
                }
            }
        }
        p = next;
    }

    p.iter()
        .enumerate()
        .map(|(s, &ps)| {
            let rec = is_recombinant(s / 4) as u8 + is_recombinant(s % 4) as u8;
            ps * rec as f64 / 2.0
        })
        .sum()
}

fn sib_chain(generations: u32, r: f64) -> f64 {
    // State: two individuals (h1, h2) and (h3, h4), index ((h1*4+h2)*4+h3)*4+h4.
    let mut p = vec![0.0f64; 256];
    p[(3 * 4) * 4 + 3] = 1.0;

    for _ in 0..generations {
        let mut next = vec![0.0f64; 256];
        for (s, &ps) in p.iter().enumerate() {
            if ps == 0.0 {
                continue;
            }
            let (i1, i2) = (s / 16, s % 16);
            let g1 = gamete(i1 / 4, i1 % 4, r);
            let g2 = gamete(i2 / 4, i2 % 4, r);

            let mut child = [0.0f64; 16];
            for a in 0..4 {
                for b in 0..4 {
                    child[a * 4 + b] = g1[a] * g2[b];
                }
            }
            for c1 in 0..16 {
                if child[c1] == 0.0 {
                    continue;
                }
                for c2 in 0..16 {
                    next[c1 * 16 + c2] += ps * child[c1] * child[c2];
                }
            }
        }
        p = next;
    }

    p.iter()
        .enumerate()
        .map(|(s, &ps)| {
            let rec = [s >> 6, (s >> 4) & 3, (s >> 2) & 3, s & 3]
                .iter()
                .filter(|&&h| is_recombinant(h))
                .count();
            ps * rec as f64 / 4.0
        })
        .sum()
}
