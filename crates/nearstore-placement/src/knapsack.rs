//! Exact 0/1 knapsack over integral weights.
//!
//! Dynamic programming indexed by (item, capacity used): `O(n × W)` time,
//! one value row plus an `n × W` decision table for reconstruction.
//! Weights and capacity are first divided by the GCD of the fitting
//! weights, and `W` is clamped to their scaled total, so byte-sized
//! weights that share a common unit stay cheap. When the table is still
//! too large, small inputs fall back to an exact depth-first search.

/// Largest entry count [`solve_within`] hands to [`search`].
pub const SEARCH_MAX_ENTRIES: usize = 24;

/// One candidate for the knapsack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnapsackEntry<K> {
    pub key: K,
    pub weight: u64,
    pub value: f64,
}

/// Optimal subset and the entries left out, both in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<K> {
    pub chosen: Vec<K>,
    pub rejected: Vec<K>,
    pub total_value: f64,
    pub total_weight: u64,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Common unit of every non-zero weight that fits `capacity`.
fn unit<K>(entries: &[KnapsackEntry<K>], capacity: u64) -> u64 {
    entries
        .iter()
        .filter(|e| e.weight <= capacity)
        .map(|e| e.weight)
        .fold(0, gcd)
        .max(1)
}

/// Effective table width for `capacity`, in multiples of `unit`.
fn effective_capacity<K>(entries: &[KnapsackEntry<K>], capacity: u64, unit: u64) -> u64 {
    let fitting: u64 = entries
        .iter()
        .filter(|e| e.weight <= capacity)
        .map(|e| e.weight / unit)
        .fold(0u64, u64::saturating_add);
    fitting.min(capacity / unit)
}

/// Number of decision cells [`solve`] will allocate.
pub fn cells<K>(entries: &[KnapsackEntry<K>], capacity: u64) -> u64 {
    let width = effective_capacity(entries, capacity, unit(entries, capacity));
    (entries.len() as u64).saturating_mul(width.saturating_add(1))
}

fn collect<K: Copy>(entries: &[KnapsackEntry<K>], flags: &[bool]) -> Selection<K> {
    let mut selection = Selection {
        chosen: Vec::new(),
        rejected: Vec::new(),
        total_value: 0.0,
        total_weight: 0,
    };
    for (entry, chosen) in entries.iter().zip(flags) {
        if *chosen {
            selection.chosen.push(entry.key);
            selection.total_value += entry.value;
            selection.total_weight += entry.weight;
        } else {
            selection.rejected.push(entry.key);
        }
    }
    selection
}

/// Pick the subset of `entries` with the greatest total value whose
/// total weight does not exceed `capacity`.
///
/// Entries with a non-positive value are never chosen. Among equally
/// valuable subsets, earlier entries are preferred.
pub fn solve<K: Copy>(entries: &[KnapsackEntry<K>], capacity: u64) -> Selection<K> {
    let unit = unit(entries, capacity);
    let width = effective_capacity(entries, capacity, unit) as usize;
    let row = width + 1;

    let mut best = vec![0.0_f64; row];
    let mut take = vec![false; entries.len() * row];

    for (i, entry) in entries.iter().enumerate() {
        if entry.weight > capacity {
            continue;
        }
        let weight = (entry.weight / unit) as usize;
        if weight > width {
            continue;
        }
        for w in (weight..=width).rev() {
            let candidate = best[w - weight] + entry.value;
            // Strict: later entries only displace on a real gain.
            if candidate > best[w] {
                best[w] = candidate;
                take[i * row + w] = true;
            }
        }
    }

    let mut flags = vec![false; entries.len()];
    let mut w = width;
    for i in (0..entries.len()).rev() {
        if take[i * row + w] {
            flags[i] = true;
            w -= (entries[i].weight / unit) as usize;
        }
    }

    collect(entries, &flags)
}

/// Same contract as [`solve`], by depth-first branch and bound.
///
/// Memory is linear in the entry count but time is exponential in the
/// worst case, so this is only meant for a handful of entries.
pub fn search<K: Copy>(entries: &[KnapsackEntry<K>], capacity: u64) -> Selection<K> {
    let mut remaining = vec![0.0_f64; entries.len() + 1];
    for i in (0..entries.len()).rev() {
        remaining[i] = remaining[i + 1] + entries[i].value.max(0.0);
    }

    let mut state = Search {
        entries,
        remaining,
        current: vec![false; entries.len()],
        best: vec![false; entries.len()],
        best_value: 0.0,
    };
    state.descend(0, capacity, 0.0);

    collect(entries, &state.best)
}

struct Search<'e, K> {
    entries: &'e [KnapsackEntry<K>],
    /// Sum of the positive values from index `i` on: an upper bound on
    /// what the rest of the branch can add.
    remaining: Vec<f64>,
    current: Vec<bool>,
    best: Vec<bool>,
    best_value: f64,
}

impl<K> Search<'_, K> {
    fn descend(&mut self, i: usize, room: u64, value: f64) {
        if value > self.best_value {
            self.best_value = value;
            self.best.clone_from(&self.current);
        }
        if i == self.entries.len() || value + self.remaining[i] < self.best_value {
            return;
        }

        let entry = &self.entries[i];
        // Include before exclude, so earlier entries win ties.
        if entry.value > 0.0 && entry.weight <= room {
            self.current[i] = true;
            self.descend(i + 1, room - entry.weight, value + entry.value);
            self.current[i] = false;
        }
        self.descend(i + 1, room, value);
    }
}

/// Solve exactly without exceeding `cell_limit` table cells: the DP
/// table when it fits, [`search`] for up to [`SEARCH_MAX_ENTRIES`]
/// entries otherwise. `None` when neither applies.
pub fn solve_within<K: Copy>(
    entries: &[KnapsackEntry<K>],
    capacity: u64,
    cell_limit: u64,
) -> Option<Selection<K>> {
    if cells(entries, capacity) <= cell_limit {
        Some(solve(entries, capacity))
    } else if entries.len() <= SEARCH_MAX_ENTRIES {
        Some(search(entries, capacity))
    } else {
        None
    }
}
