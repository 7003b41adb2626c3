use std::collections::HashMap;
use std::path::Path;

use crate::error::{MpError, Result};

/// One row of a breeding pedigree, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PedigreeEntry {
    pub id: String,
    pub mother: Option<String>,
    pub father: Option<String>,
    /// Whether the individual was genotyped (appears in the final matrix).
    pub observed: bool,
    /// Design annotation, if the pedigree already carries one.
    pub design: Option<String>,
}

impl PedigreeEntry {
    /// A founder: both parents unknown, not observed.
    pub fn founder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            mother: None,
            father: None,
            observed: false,
            design: None,
        }
    }

    /// A cross between `mother` and `father`.
    pub fn cross(id: &str, mother: &str, father: &str) -> Self {
        Self {
            id: id.to_string(),
            mother: Some(mother.to_string()),
            father: Some(father.to_string()),
            observed: false,
            design: None,
        }
    }

    /// Mark the entry as observed (genotyped).
    pub fn observed(mut self) -> Self {
        self.observed = true;
        self
    }

    /// Attach a design annotation.
    pub fn with_design(mut self, design: &str) -> Self {
        self.design = Some(design.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct PedigreeRecord {
    id: String,
    mother: Option<usize>,
    father: Option<usize>,
    observed: bool,
    design: Option<String>,
}

/// The breeding history of a multi-parent population.
///
/// Individuals are mapped to contiguous 0-based indices in input order.
/// Founders are individuals with both parents unknown. A selfed individual
/// has the same mother and father.
#[derive(Debug, Clone, Default)]
pub struct Pedigree {
    records: Vec<PedigreeRecord>,
    id_to_index: HashMap<String, usize>,
}

impl Pedigree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pedigree from entries given in any order.
    ///
    /// # Errors
    /// Returns an error on duplicate IDs, on parents that are not themselves
    /// listed in the pedigree, and on individuals with exactly one known
    /// parent.
    pub fn from_entries(entries: &[PedigreeEntry]) -> Result<Self> {
        let mut ped = Self::new();

        // First pass: register all individuals so parent lookups succeed
        // regardless of input order.
        for e in entries {
            if ped.id_to_index.contains_key(&e.id) {
                return Err(MpError::Pedigree(format!("Duplicate individual ID: '{}'", e.id)));
            }
            let index = ped.records.len();
            ped.records.push(PedigreeRecord {
                id: e.id.clone(),
                mother: None,
                father: None,
                observed: e.observed,
                design: e.design.clone(),
            });
            ped.id_to_index.insert(e.id.clone(), index);
        }

        // Second pass: resolve parent indices.
        for (i, e) in entries.iter().enumerate() {
            let mother = ped.resolve_parent(&e.id, e.mother.as_deref())?;
            let father = ped.resolve_parent(&e.id, e.father.as_deref())?;
            if mother.is_some() != father.is_some() {
                return Err(MpError::Pedigree(format!(
                    "Individual '{}' has only one known parent",
                    e.id
                )));
            }
            ped.records[i].mother = mother;
            ped.records[i].father = father;
        }

        Ok(ped)
    }

    fn resolve_parent(&self, child: &str, parent: Option<&str>) -> Result<Option<usize>> {
        match parent {
            None => Ok(None),
            Some(p) => self.id_to_index.get(p).copied().map(Some).ok_or_else(|| {
                MpError::Pedigree(format!(
                    "Individual '{}' references parent '{}' which is not in the pedigree",
                    child, p
                ))
            }),
        }
    }

    /// Read a pedigree from a CSV file.
    ///
    /// Required columns (header, case-insensitive): `id`, `mother` (or
    /// `female`/`dam`), `father` (or `male`/`sire`). Optional: `observed`
    /// (`1`/`true`/`yes`) and `design`. Unknown parents are coded as `"0"`,
    /// `""` or `"NA"`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, a required column is
    /// missing, or the records are inconsistent (see [`Pedigree::from_entries`]).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
        let id_col = find(&["id"])
            .ok_or_else(|| MpError::Pedigree("CSV missing 'id' column".to_string()))?;
        let mother_col = find(&["mother", "female", "dam"])
            .ok_or_else(|| MpError::Pedigree("CSV missing 'mother' column".to_string()))?;
        let father_col = find(&["father", "male", "sire"])
            .ok_or_else(|| MpError::Pedigree("CSV missing 'father' column".to_string()))?;
        let observed_col = find(&["observed"]);
        let design_col = find(&["design"]);

        let mut entries = Vec::new();
        for result in reader.records() {
            let record = result?;
            let field = |col: usize| record.get(col).unwrap_or("");
            entries.push(PedigreeEntry {
                id: field(id_col).to_string(),
                mother: parse_parent(field(mother_col)),
                father: parse_parent(field(father_col)),
                observed: observed_col.map(|c| parse_flag(field(c))).unwrap_or(false),
                design: design_col.and_then(|c| parse_parent(field(c))),
            });
        }

        Self::from_entries(&entries)
    }

    pub fn n_individuals(&self) -> usize {
        self.records.len()
    }

    pub fn index(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn id(&self, index: usize) -> &str {
        &self.records[index].id
    }

    pub fn mother(&self, index: usize) -> Option<usize> {
        self.records[index].mother
    }

    pub fn father(&self, index: usize) -> Option<usize> {
        self.records[index].father
    }

    pub fn is_observed(&self, index: usize) -> bool {
        self.records[index].observed
    }

    pub fn design(&self, index: usize) -> Option<&str> {
        self.records[index].design.as_deref()
    }

    pub fn is_founder(&self, index: usize) -> bool {
        self.records[index].mother.is_none() && self.records[index].father.is_none()
    }

    /// Indices of founders, in pedigree order.
    pub fn founders(&self) -> Vec<usize> {
        (0..self.records.len()).filter(|&i| self.is_founder(i)).collect()
    }

    /// Indices of observed individuals, in pedigree order.
    pub fn observed(&self) -> Vec<usize> {
        (0..self.records.len()).filter(|&i| self.is_observed(i)).collect()
    }

    /// Whether every observed individual carries a design annotation.
    pub fn has_designs(&self) -> bool {
        let observed = self.observed();
        !observed.is_empty() && observed.iter().all(|&i| self.records[i].design.is_some())
    }

    /// A copy of this pedigree with the given design labels attached.
    ///
    /// Individuals absent from `designs` keep their current annotation.
    pub fn with_designs(&self, designs: &HashMap<usize, String>) -> Self {
        let mut ped = self.clone();
        for (&i, label) in designs {
            if let Some(rec) = ped.records.get_mut(i) {
                rec.design = Some(label.clone());
            }
        }
        ped
    }

    /// A copy of this pedigree with the given individuals flagged as observed.
    ///
    /// Unknown IDs are ignored.
    pub fn with_observed(&self, ids: &[String]) -> Self {
        let mut ped = self.clone();
        for id in ids {
            if let Some(&i) = ped.id_to_index.get(id) {
                ped.records[i].observed = true;
            }
        }
        ped
    }

    /// Mother and father are the same individual.
    pub fn is_selfed(&self, index: usize) -> bool {
        matches!(
            (self.records[index].mother, self.records[index].father),
            (Some(m), Some(f)) if m == f
        )
    }

    /// Mother and father are distinct full sibs.
    pub fn is_sib_mated(&self, index: usize) -> bool {
        match (self.records[index].mother, self.records[index].father) {
            (Some(m), Some(f)) if m != f => {
                let pm = (self.records[m].mother, self.records[m].father);
                let pf = (self.records[f].mother, self.records[f].father);
                pm.0.is_some() && (pm == pf || pm == (pf.1, pf.0))
            }
            _ => false,
        }
    }

    /// Founders contributing to `index`, in order of first appearance when
    /// ancestry is expanded depth-first with the mother before the father.
    ///
    /// For a funnel cross this is the funnel order: `[A, B, C, D]` for
    /// `(A x B) x (C x D)`.
    pub fn founder_ancestry(&self, index: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut seen = vec![false; self.records.len()];
        let mut stack = vec![index];

        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            match (self.records[i].mother, self.records[i].father) {
                (Some(m), Some(f)) => {
                    stack.push(f);
                    stack.push(m);
                }
                _ => order.push(i),
            }
        }
        order
    }

    /// Number of generations from the founders to each individual.
    ///
    /// Founders are generation 0; otherwise one more than the later parent.
    ///
    /// # Errors
    /// Returns an error if the pedigree contains a cycle.
    pub fn generations(&self) -> Result<Vec<usize>> {
        let order = self.topological_order()?;
        let mut gen = vec![0usize; self.records.len()];
        for i in order {
            if let (Some(m), Some(f)) = (self.records[i].mother, self.records[i].father) {
                gen[i] = gen[m].max(gen[f]) + 1;
            }
        }
        Ok(gen)
    }

    /// Validate the pedigree for consistency.
    ///
    /// Checks that no individual is its own parent and that there are no
    /// cycles.
    ///
    /// # Errors
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (i, rec) in self.records.iter().enumerate() {
            if rec.mother == Some(i) || rec.father == Some(i) {
                return Err(MpError::Pedigree(format!(
                    "Individual '{}' is listed as its own parent",
                    rec.id
                )));
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Parents-before-offspring ordering (Kahn's algorithm).
    fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.records.len();
        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0u32; n];

        for (i, rec) in self.records.iter().enumerate() {
            // A selfed individual has a single parent edge.
            let mut parents = vec![];
            if let Some(m) = rec.mother {
                parents.push(m);
            }
            if let Some(f) = rec.father {
                if rec.mother != Some(f) {
                    parents.push(f);
                }
            }
            for p in parents {
                children_of[p].push(i);
                in_degree[i] += 1;
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        queue.reverse();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop() {
            order.push(node);
            for &child in &children_of[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push(child);
                }
            }
        }

        if order.len() != n {
            return Err(MpError::Pedigree("Pedigree contains a cycle".to_string()));
        }
        Ok(order)
    }
}

/// Parse a parent string, returning `None` for unknown parents.
///
/// Unknown parents are coded as `"0"`, `""`, `"NA"`, or `"na"`.
fn parse_parent(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "t" | "y"
    )
}
