//! Group-aware train/evaluation split
//!
//! Whole subject groups are assigned to one side, so no individual's rows
//! appear in both partitions.

use crate::error::ComputeError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Row indices and group names on each side of a split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Sorted
    pub train_groups: Vec<String>,
    /// Sorted
    pub test_groups: Vec<String>,
}

impl GroupSplit {
    /// True when no group is on both sides
    pub fn is_disjoint(&self) -> bool {
        let train: HashSet<&String> = self.train_groups.iter().collect();
        self.test_groups.iter().all(|g| !train.contains(g))
    }
}

/// Hold out `ceil(test_size * n_groups)` randomly chosen groups.
///
/// At least one group always stays on each side, so two groups are required.
pub fn group_shuffle_split<S: AsRef<str>>(
    groups: &[S],
    test_size: f64,
    seed: u64,
) -> Result<GroupSplit, ComputeError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ComputeError::InvalidConfig(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let names: Vec<&str> = groups.iter().map(|g| g.as_ref()).collect();
    let unique: Vec<&str> = names
        .iter()
        .copied()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .collect();
    let n_groups = unique.len();
    if n_groups < 2 {
        return Err(ComputeError::InsufficientGroups { groups: n_groups });
    }

    let n_test = ((test_size * n_groups as f64).ceil() as usize).clamp(1, n_groups - 1);

    let mut shuffled = unique;
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let test_set: HashSet<&str> = shuffled[..n_test].iter().copied().collect();

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (i, name) in names.iter().enumerate() {
        if test_set.contains(name) {
            test.push(i);
        } else {
            train.push(i);
        }
    }

    let mut test_groups: Vec<String> = shuffled[..n_test].iter().map(|g| g.to_string()).collect();
    let mut train_groups: Vec<String> = shuffled[n_test..].iter().map(|g| g.to_string()).collect();
    test_groups.sort();
    train_groups.sort();

    Ok(GroupSplit {
        train,
        test,
        train_groups,
        test_groups,
    })
}
