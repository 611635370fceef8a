//! Age-group assignments shared by every per-timestep pass.
//!
//! Grouping runs once per run (or once per timestep when ages change) and
//! the result is handed by reference to the histogram and averaging passes,
//! so both see exactly the same assignment for every user.

use crate::binning::AgeGrouper;
use crate::models::AgeMatrix;
use rayon::prelude::*;
use tracing::debug;

/// How ages relate to the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeMode {
    /// One age row per timestep.
    Ageing,
    /// Row 0 holds every user's age for the whole run.
    Static,
}

impl AgeMode {
    /// Row of the age matrix that applies at timestep `t`.
    pub fn row_for(self, t: usize) -> usize {
        match self {
            AgeMode::Ageing => t,
            AgeMode::Static => 0,
        }
    }
}

/// Group index (or `None` for unbinned) of every user at every timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAssignments {
    mode: AgeMode,
    timesteps: usize,
    users: usize,
    groups: usize,
    slots: Vec<Option<usize>>,
}

impl GroupAssignments {
    /// Group every user for `timesteps` steps.
    ///
    /// In [`AgeMode::Static`] only row 0 of `ages` is read and the result is
    /// reused for every timestep. Callers check shapes beforehand.
    pub fn compute(
        ages: &AgeMatrix,
        grouper: &AgeGrouper,
        mode: AgeMode,
        timesteps: usize,
    ) -> Self {
        let users = ages.users();

        let slots = match mode {
            AgeMode::Static if timesteps > 0 => {
                debug!("Grouping {} users once for all timesteps", users);
                grouper.group_all(ages.row(0))
            }
            AgeMode::Static => Vec::new(),
            AgeMode::Ageing => {
                debug!(
                    "Grouping {} users at each of {} timesteps",
                    users, timesteps
                );
                let mut slots = vec![None; timesteps * users];
                if users > 0 {
                    slots
                        .par_chunks_mut(users)
                        .enumerate()
                        .for_each(|(t, row)| {
                            for (slot, &age) in row.iter_mut().zip(ages.row(t)) {
                                *slot = grouper.group(age);
                            }
                        });
                }
                slots
            }
        };

        Self {
            mode,
            timesteps,
            users,
            groups: grouper.group_count(),
            slots,
        }
    }

    pub fn mode(&self) -> AgeMode {
        self.mode
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn users(&self) -> usize {
        self.users
    }

    pub fn group_count(&self) -> usize {
        self.groups
    }

    /// Assignments in effect at timestep `t`.
    pub fn at(&self, t: usize) -> &[Option<usize>] {
        debug_assert!(t < self.timesteps);
        match self.mode {
            AgeMode::Static => &self.slots,
            AgeMode::Ageing => &self.slots[t * self.users..(t + 1) * self.users],
        }
    }

    /// Users without a group at timestep `t`.
    pub fn unbinned_at(&self, t: usize) -> usize {
        self.at(t).iter().filter(|g| g.is_none()).count()
    }

    /// Users per group at timestep `t`, ignoring attribute values.
    pub fn population_at(&self, t: usize) -> Vec<u64> {
        let mut population = vec![0u64; self.groups];
        for g in self.at(t).iter().flatten() {
            population[*g] += 1;
        }
        population
    }
}
