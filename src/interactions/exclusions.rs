// SPDX-License-Identifier: AGPL-3.0-only

//! Excluded-pair set in compressed sparse row form.
//!
//! Rows are per-particle adjacency lists, sorted ascending, stored
//! symmetrically (each excluded pair appears in both rows). Membership
//! queries scan a row from its highest index downward and stop as soon as
//! a stored index drops below the probe — forward neighbors of a low index
//! sit at the tail of the row, so the expected cost is a handful of
//! comparisons rather than the row length.

/// CSR adjacency of excluded particle pairs.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    starts: Vec<u32>,
    indices: Vec<u32>,
}

impl ExclusionSet {
    /// Build from unordered pairs. Pairs are stored symmetrically and each
    /// row is sorted ascending. Duplicate pairs collapse to one entry.
    #[must_use]
    pub fn from_pairs(n_particles: usize, pairs: &[(usize, usize)]) -> Self {
        let mut rows: Vec<Vec<u32>> = vec![Vec::new(); n_particles];
        for &(i, j) in pairs {
            rows[i].push(j as u32);
            rows[j].push(i as u32);
        }
        let mut starts = Vec::with_capacity(n_particles + 1);
        let mut indices = Vec::new();
        starts.push(0u32);
        for row in &mut rows {
            row.sort_unstable();
            row.dedup();
            indices.extend_from_slice(row);
            starts.push(indices.len() as u32);
        }
        Self { starts, indices }
    }

    /// Whether the pair (i, j) is excluded. Order-insensitive.
    #[must_use]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let (row, probe) = (i.min(j), i.max(j) as u32);
        let lo = self.starts[row] as usize;
        let hi = self.starts[row + 1] as usize;
        for &stored in self.indices[lo..hi].iter().rev() {
            if stored == probe {
                return true;
            }
            if stored < probe {
                return false;
            }
        }
        false
    }

    /// Sorted exclusion row of one particle.
    #[must_use]
    pub fn row(&self, i: usize) -> &[u32] {
        &self.indices[self.starts[i] as usize..self.starts[i + 1] as usize]
    }

    /// Row offsets (length `n_particles + 1`), for GPU upload.
    #[must_use]
    pub fn starts(&self) -> &[u32] {
        &self.starts
    }

    /// Flat adjacency entries, for GPU upload.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
