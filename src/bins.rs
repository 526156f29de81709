// MIT License
//
// Copyright (c) 2025 Jai Veilleux
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

/// One contiguous bin of `(element, weight)` pairs per group, with a running
/// weight sum per bin.
///
/// Bins stay contiguous under removal via swap-remove, so a uniform pick
/// within a bin is a single index draw and removal at a known slot is O(1).
#[derive(Debug, Clone)]
pub(crate) struct GroupBins<T> {
    bins: Vec<Vec<(T, f64)>>,
    sums: Vec<f64>,
}

impl<T: Clone> GroupBins<T> {
    pub fn new(group_count: usize) -> Self {
        GroupBins {
            bins: vec![Vec::new(); group_count],
            sums: vec![0.0; group_count],
        }
    }

    /// Appends to a bin and returns the slot the entry landed in.
    pub fn push(&mut self, group: usize, element: T, weight: f64) -> usize {
        let bin = &mut self.bins[group];
        bin.push((element, weight));
        self.sums[group] += weight;
        bin.len() - 1
    }

    /// Overwrites the weight at a slot, adjusting the bin sum by the delta.
    pub fn set_weight(&mut self, group: usize, slot: usize, weight: f64) {
        let entry = &mut self.bins[group][slot];
        self.sums[group] += weight - entry.1;
        entry.1 = weight;
    }

    /// Removes the entry at `slot` by swapping in the last entry of the bin.
    ///
    /// Returns the removed weight and, when a different entry was relocated
    /// into `slot`, that entry's element. The caller owns the position
    /// back-pointers and must repoint the relocated element at `slot`.
    pub fn swap_remove(&mut self, group: usize, slot: usize) -> (f64, Option<T>) {
        let bin = &mut self.bins[group];
        let (_, removed_weight) = bin.swap_remove(slot);
        self.sums[group] -= removed_weight;
        let relocated = (slot < bin.len()).then(|| bin[slot].0.clone());
        (removed_weight, relocated)
    }

    pub fn sum(&self, group: usize) -> f64 {
        self.sums[group]
    }

    pub fn len(&self, group: usize) -> usize {
        self.bins[group].len()
    }

    pub fn get(&self, group: usize, slot: usize) -> &(T, f64) {
        &self.bins[group][slot]
    }

    pub fn group_count(&self) -> usize {
        self.bins.len()
    }

    pub fn as_slices(&self) -> &[Vec<(T, f64)>] {
        &self.bins
    }

    /// Replaces the cached sum with an exact re-summation of the bin.
    ///
    /// Incremental deltas drift over long mutation chains; this restores the
    /// cached sum to the rounding error of a single pass.
    pub fn recompute_sum(&mut self, group: usize) -> f64 {
        let exact: f64 = self.bins[group].iter().map(|&(_, w)| w).sum();
        self.sums[group] = exact;
        exact
    }

    /// Empties every bin and zeroes every sum; group count and bin capacity
    /// are retained.
    pub fn clear(&mut self) {
        for bin in &mut self.bins {
            bin.clear();
        }
        for sum in &mut self.sums {
            *sum = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_tracks_slots_and_sums() {
        let mut bins = GroupBins::new(3);
        assert_eq!(bins.push(1, "a", 2.0), 0);
        assert_eq!(bins.push(1, "b", 3.0), 1);
        assert_eq!(bins.push(2, "c", 5.0), 0);
        assert_eq!(bins.sum(1), 5.0);
        assert_eq!(bins.sum(2), 5.0);
        assert_eq!(bins.len(1), 2);
        assert_eq!(bins.get(1, 0), &("a", 2.0));
    }

    #[test]
    fn set_weight_adjusts_sum_in_place() {
        let mut bins = GroupBins::new(1);
        bins.push(0, "a", 2.0);
        bins.push(0, "b", 3.0);
        bins.set_weight(0, 0, 2.5);
        assert_eq!(bins.get(0, 0), &("a", 2.5));
        assert_eq!(bins.sum(0), 5.5);
    }

    #[test]
    fn swap_remove_middle_reports_relocated_element() {
        let mut bins = GroupBins::new(1);
        bins.push(0, "a", 1.0);
        bins.push(0, "b", 2.0);
        bins.push(0, "c", 3.0);

        let (weight, relocated) = bins.swap_remove(0, 0);
        assert_eq!(weight, 1.0);
        assert_eq!(relocated, Some("c"));
        assert_eq!(bins.get(0, 0), &("c", 3.0));
        assert_eq!(bins.len(0), 2);
        assert_eq!(bins.sum(0), 5.0);
    }

    #[test]
    fn swap_remove_last_relocates_nothing() {
        let mut bins = GroupBins::new(1);
        bins.push(0, "a", 1.0);
        bins.push(0, "b", 2.0);

        let (weight, relocated) = bins.swap_remove(0, 1);
        assert_eq!(weight, 2.0);
        assert_eq!(relocated, None);
        assert_eq!(bins.len(0), 1);
        assert_eq!(bins.sum(0), 1.0);
    }

    #[test]
    fn swap_remove_sole_entry() {
        let mut bins = GroupBins::new(1);
        bins.push(0, "a", 1.0);
        let (weight, relocated) = bins.swap_remove(0, 0);
        assert_eq!(weight, 1.0);
        assert_eq!(relocated, None);
        assert_eq!(bins.len(0), 0);
        assert_eq!(bins.sum(0), 0.0);
    }

    #[test]
    fn recompute_sum_matches_contents() {
        let mut bins = GroupBins::new(1);
        for i in 0..100 {
            bins.push(0, i, 0.1);
        }
        let exact = bins.recompute_sum(0);
        let manual: f64 = (0..100).map(|_| 0.1).sum();
        assert_eq!(exact, manual);
        assert_eq!(bins.sum(0), exact);
    }

    #[test]
    fn clear_keeps_group_count() {
        let mut bins = GroupBins::new(4);
        bins.push(0, 1u32, 1.0);
        bins.push(3, 2u32, 2.0);
        bins.clear();
        assert_eq!(bins.group_count(), 4);
        assert_eq!(bins.len(0), 0);
        assert_eq!(bins.sum(3), 0.0);
    }
}
