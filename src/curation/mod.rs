// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Manual curation of spike sorting results.
//!
//! [`CurationSorting`] wraps a [`Sorting`] and applies the three curation
//! operations: removing units, merging several units into one, and splitting
//! one unit into several. Every applied operation is kept in the history and
//! can be undone.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ephysio::curation::{CurationSorting, Sorting};
//!
//! let mut sorting = Sorting::new(30000.0);
//! sorting.insert_unit(1, vec![10, 50]);
//! sorting.insert_unit(2, vec![20]);
//! sorting.insert_unit(3, vec![5, 40]);
//!
//! let mut curation = CurationSorting::new(sorting);
//! let merged = curation.merge(&[1, 2], None)?;
//! curation.remove_units(&[3])?;
//! assert_eq!(curation.sorting().unit_ids(), vec![merged]);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EphysError, Result};

/// Unit identifier.
pub type UnitId = i64;

/// Spike trains of sorted units, in sample indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorting {
    /// Sample rate of the spike trains in Hz
    pub sampling_frequency: f64,
    /// Spike train of each unit, sorted ascending
    pub units: BTreeMap<UnitId, Vec<i64>>,
}

impl Sorting {
    /// Create an empty sorting.
    pub fn new(sampling_frequency: f64) -> Self {
        Self {
            sampling_frequency,
            units: BTreeMap::new(),
        }
    }

    /// Add or replace a unit; the spike train is sorted.
    pub fn insert_unit(&mut self, id: UnitId, mut spikes: Vec<i64>) {
        spikes.sort_unstable();
        self.units.insert(id, spikes);
    }

    /// Unit ids in ascending order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Spike train of a unit.
    pub fn spike_train(&self, id: UnitId) -> Option<&[i64]> {
        self.units.get(&id).map(Vec::as_slice)
    }

    /// Number of units.
    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    fn require(&self, id: UnitId) -> Result<()> {
        if self.units.contains_key(&id) {
            Ok(())
        } else {
            Err(EphysError::UnknownUnit { unit_id: id })
        }
    }

    fn next_id(&self) -> UnitId {
        self.units.keys().next_back().map_or(0, |max| max + 1)
    }
}

/// One applied curation operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CurationOp {
    /// Units deleted
    Remove {
        /// Removed ids
        units: Vec<UnitId>,
    },
    /// Units merged into a new one
    Merge {
        /// Merged ids
        units: Vec<UnitId>,
        /// Resulting id
        new_id: UnitId,
    },
    /// Unit split into new ones
    Split {
        /// Split id
        unit: UnitId,
        /// Resulting ids, in ascending label order
        new_ids: Vec<UnitId>,
    },
}

#[derive(Debug, Clone)]
struct Step {
    op: CurationOp,
    before: Sorting,
}

/// A sorting under curation.
#[derive(Debug, Clone)]
pub struct CurationSorting {
    current: Sorting,
    steps: Vec<Step>,
}

impl CurationSorting {
    /// Start curating a sorting.
    pub fn new(sorting: Sorting) -> Self {
        Self {
            current: sorting,
            steps: Vec::new(),
        }
    }

    /// Current state.
    pub fn sorting(&self) -> &Sorting {
        &self.current
    }

    /// Finish curation and return the current state.
    pub fn into_sorting(self) -> Sorting {
        self.current
    }

    /// Applied operations, oldest first.
    pub fn history(&self) -> Vec<&CurationOp> {
        self.steps.iter().map(|s| &s.op).collect()
    }

    fn record(&mut self, op: CurationOp, before: Sorting) {
        debug!(?op, units = self.current.num_units(), "curation step");
        self.steps.push(Step { op, before });
    }

    /// Delete units.
    ///
    /// # Errors
    ///
    /// Fails without changes if any id is unknown or the list is empty.
    pub fn remove_units(&mut self, ids: &[UnitId]) -> Result<()> {
        if ids.is_empty() {
            return Err(EphysError::curation("no units to remove"));
        }
        for &id in ids {
            self.current.require(id)?;
        }

        let before = self.current.clone();
        for id in ids {
            self.current.units.remove(id);
        }
        self.record(CurationOp::Remove { units: ids.to_vec() }, before);
        Ok(())
    }

    /// Merge units into one.
    ///
    /// Spike trains are concatenated and sorted. Without `new_id` the new
    /// unit takes the largest existing id plus one. `new_id` may reuse one
    /// of the merged ids but not a surviving unit's id.
    ///
    /// # Errors
    ///
    /// Fails without changes for fewer than two distinct units, an unknown
    /// unit or a colliding `new_id`.
    pub fn merge(&mut self, ids: &[UnitId], new_id: Option<UnitId>) -> Result<UnitId> {
        let distinct: BTreeSet<UnitId> = ids.iter().copied().collect();
        if distinct.len() < 2 {
            return Err(EphysError::curation("merge needs at least two distinct units"));
        }
        for &id in &distinct {
            self.current.require(id)?;
        }

        let new_id = new_id.unwrap_or_else(|| self.current.next_id());
        if self.current.units.contains_key(&new_id) && !distinct.contains(&new_id) {
            return Err(EphysError::curation(format!(
                "merged unit id {new_id} is already used"
            )));
        }

        let before = self.current.clone();
        let mut spikes = Vec::new();
        for id in &distinct {
            if let Some(train) = self.current.units.remove(id) {
                spikes.extend(train);
            }
        }
        self.current.insert_unit(new_id, spikes);
        self.record(
            CurationOp::Merge {
                units: distinct.into_iter().collect(),
                new_id,
            },
            before,
        );
        Ok(new_id)
    }

    /// Split a unit by per-spike labels.
    ///
    /// One new unit is created per distinct label, in ascending label order.
    /// Without `new_ids` they take consecutive ids after the largest
    /// existing id.
    ///
    /// # Errors
    ///
    /// Fails without changes for an unknown unit, a label count that differs
    /// from the spike count, fewer than two distinct labels, a wrong number
    /// of `new_ids` or ids colliding with surviving units.
    pub fn split(
        &mut self,
        id: UnitId,
        labels: &[usize],
        new_ids: Option<Vec<UnitId>>,
    ) -> Result<Vec<UnitId>> {
        self.current.require(id)?;
        let train = &self.current.units[&id];
        if labels.len() != train.len() {
            return Err(EphysError::curation(format!(
                "{} labels for {} spikes of unit {id}",
                labels.len(),
                train.len()
            )));
        }

        let distinct: BTreeSet<usize> = labels.iter().copied().collect();
        if distinct.len() < 2 {
            return Err(EphysError::curation("split needs at least two distinct labels"));
        }

        let new_ids = match new_ids {
            Some(ids) => {
                if ids.len() != distinct.len() {
                    return Err(EphysError::curation(format!(
                        "{} new ids for {} labels",
                        ids.len(),
                        distinct.len()
                    )));
                }
                let unique: BTreeSet<UnitId> = ids.iter().copied().collect();
                if unique.len() != ids.len() {
                    return Err(EphysError::curation("new ids are not distinct"));
                }
                if let Some(taken) = ids
                    .iter()
                    .find(|&&n| n != id && self.current.units.contains_key(&n))
                {
                    return Err(EphysError::curation(format!(
                        "split unit id {taken} is already used"
                    )));
                }
                ids
            }
            None => {
                let first = self.current.next_id();
                (0..distinct.len() as i64).map(|i| first + i).collect()
            }
        };

        let mut parts: BTreeMap<usize, Vec<i64>> = BTreeMap::new();
        for (&spike, &label) in train.iter().zip(labels) {
            parts.entry(label).or_default().push(spike);
        }

        let before = self.current.clone();
        self.current.units.remove(&id);
        for (new_id, (_, spikes)) in new_ids.iter().zip(parts) {
            self.current.insert_unit(*new_id, spikes);
        }
        self.record(
            CurationOp::Split {
                unit: id,
                new_ids: new_ids.clone(),
            },
            before,
        );
        Ok(new_ids)
    }

    /// Revert the last operation.
    ///
    /// Returns the reverted operation, or `None` if the history is empty.
    pub fn undo(&mut self) -> Option<CurationOp> {
        let step = self.steps.pop()?;
        self.current = step.before;
        Some(step.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorting() -> Sorting {
        let mut s = Sorting::new(30000.0);
        s.insert_unit(1, vec![50, 10]);
        s.insert_unit(2, vec![20, 60]);
        s.insert_unit(5, vec![1, 2, 3, 4]);
        s
    }

    #[test]
    fn test_remove() {
        let mut c = CurationSorting::new(sorting());
        c.remove_units(&[1, 5]).unwrap();
        assert_eq!(c.sorting().unit_ids(), vec![2]);

        assert!(matches!(
            c.remove_units(&[9]),
            Err(EphysError::UnknownUnit { unit_id: 9 })
        ));
        assert!(c.remove_units(&[]).is_err());
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn test_merge_default_id() {
        let mut c = CurationSorting::new(sorting());
        let id = c.merge(&[1, 2], None).unwrap();
        assert_eq!(id, 6);
        assert_eq!(c.sorting().spike_train(6), Some(&[10, 20, 50, 60][..]));
        assert_eq!(c.sorting().unit_ids(), vec![5, 6]);
    }

    #[test]
    fn test_merge_validation() {
        let mut c = CurationSorting::new(sorting());
        assert!(c.merge(&[1], None).is_err());
        assert!(c.merge(&[1, 1], None).is_err());
        assert!(c.merge(&[1, 7], None).is_err());
        assert!(c.merge(&[1, 2], Some(5)).is_err());

        // reusing a merged id is allowed
        assert_eq!(c.merge(&[1, 2], Some(1)).unwrap(), 1);
        assert_eq!(c.sorting().unit_ids(), vec![1, 5]);
    }

    #[test]
    fn test_split() {
        let mut c = CurationSorting::new(sorting());
        let ids = c.split(5, &[1, 0, 1, 0], None).unwrap();
        assert_eq!(ids, vec![6, 7]);
        assert_eq!(c.sorting().spike_train(6), Some(&[2, 4][..]));
        assert_eq!(c.sorting().spike_train(7), Some(&[1, 3][..]));
        assert!(c.sorting().spike_train(5).is_none());
    }

    #[test]
    fn test_split_validation() {
        let mut c = CurationSorting::new(sorting());
        assert!(c.split(5, &[0, 1], None).is_err());
        assert!(c.split(5, &[0, 0, 0, 0], None).is_err());
        assert!(c.split(5, &[0, 1, 0, 1], Some(vec![10])).is_err());
        assert!(c.split(5, &[0, 1, 0, 1], Some(vec![10, 10])).is_err());
        assert!(c.split(5, &[0, 1, 0, 1], Some(vec![1, 10])).is_err());
        assert!(c.split(8, &[0], None).is_err());

        let ids = c.split(5, &[0, 1, 0, 1], Some(vec![5, 10])).unwrap();
        assert_eq!(ids, vec![5, 10]);
        assert!(c.history().len() == 1);
    }

    #[test]
    fn test_undo() {
        let original = sorting();
        let mut c = CurationSorting::new(original.clone());
        c.merge(&[1, 2], None).unwrap();
        c.remove_units(&[5]).unwrap();

        assert!(matches!(c.undo(), Some(CurationOp::Remove { .. })));
        assert!(matches!(c.undo(), Some(CurationOp::Merge { new_id: 6, .. })));
        assert_eq!(c.undo(), None);
        assert_eq!(c.sorting(), &original);
    }

    #[test]
    fn test_history_serializes() {
        let mut c = CurationSorting::new(sorting());
        c.merge(&[2, 1], Some(9)).unwrap();
        let json = serde_json::to_string(&c.history()).unwrap();
        assert_eq!(json, r#"[{"op":"merge","units":[1,2],"new_id":9}]"#);
    }
}
