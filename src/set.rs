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

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32 as RngType;

use crate::bins::GroupBins;
use crate::groups::WeightGroups;
use crate::tree::SumTree;

/// Errors raised by [`WeightedSet`] operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Construction bounds were rejected: requires `0 < min <= max`, both finite.
    InvalidBounds { min: f64, max: f64 },
    /// A weight argument fell outside `[min, max]`.
    OutOfRange { weight: f64, min: f64, max: f64 },
    /// Insert for an element that is already present.
    DuplicateElement,
    /// Weight update or removal for an element that is not present.
    MissingElement,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBounds { min, max } => {
                write!(f, "invalid weight bounds [{}, {}]", min, max)
            }
            Error::OutOfRange { weight, min, max } => {
                write!(f, "weight {} is out of range [{}, {}]", weight, min, max)
            }
            Error::DuplicateElement => write!(f, "element is already in the set"),
            Error::MissingElement => write!(f, "element is not in the set"),
        }
    }
}

impl std::error::Error for Error {}

/// A set of distinct elements with positive weights, samplable *with
/// replacement* in expected $\mathcal{O}(\log\log W)$ time per draw, where
/// $W = w_{\max} / w_{\min}$.
///
/// This implements the composition-rejection sampler of
/// St-Onge et al., *Comput. Phys. Commun.* 240 (2019) 30-37
/// (DOI: [10.1016/j.cpc.2019.02.008](https://doi.org/10.1016/j.cpc.2019.02.008)),
/// with **dyadic (power-of-two) weight groups**.
///
/// # Model
/// Pairs $(x_i, w_i)$ with $w_{\min} \le w_i \le w_{\max}$ are partitioned by
/// weight scale into $G \approx \lfloor \log_2 W \rfloor + 1$ groups,
/// $G_g = \\{ i \mid w_{\min} 2^g \le w_i < w_{\min} 2^{g+1} \\}$, the last
/// group closed at $w_{\max}$. Each group keeps a contiguous bin of its
/// members and a cached total $S_g$; the totals sit in the leaves of a flat
/// complete binary tree whose internal nodes hold subtree sums.
///
/// # Sampling (composition and rejection)
/// 1. **Composition:** descend the sum tree with a uniform draw from
///    $[0, \sum_g S_g)$, selecting group $g$ with probability $S_g / \sum S$.
/// 2. **Rejection:** pick a slot of $G_g$ uniformly and accept it with
///    probability $w / w^*_g$, where $w^*_g = w_{\min} 2^{g+1}$ is the group
///    ceiling; otherwise retry from step 1.
///
/// Grouped weights are within a factor of two of the ceiling, so a draw
/// makes at most 2 expected passes.
///
/// # Mutation
/// Insert, weight update, and removal are $\mathcal{O}(\log G)$: one bin
/// mutation under the swap-remove discipline plus one leaf-to-root update.
/// The element table maps each element to its `(group, slot)` position so
/// lookups never scan.
///
/// # Examples
/// ```
/// use dynsample::WeightedSet;
///
/// let mut set = WeightedSet::new(1.0, 100.0).unwrap();
/// set.insert(&"a", 1.0).unwrap();
/// set.insert(&"b", 99.0).unwrap();
///
/// let (element, weight) = set.sample().unwrap();
/// assert!(weight == 1.0 || weight == 99.0);
///
/// for (element, weight) in &set {
///     // visits each stored pair once
/// }
/// ```
#[derive(Debug)]
pub struct WeightedSet<T>
where
    T: Clone + Eq + Hash,
{
    groups: WeightGroups,
    bins: GroupBins<T>,
    tree: SumTree,
    table: HashMap<T, (usize, usize)>,
    rng: RngType,
}

impl<T> WeightedSet<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an empty set accepting weights in `[min_weight, max_weight]`,
    /// with the generator seeded from OS entropy.
    ///
    /// Returns [`Error::InvalidBounds`] unless `0 < min_weight <= max_weight`
    /// and both bounds are finite.
    pub fn new(min_weight: f64, max_weight: f64) -> Result<Self, Error> {
        Self::build(min_weight, max_weight, RngType::from_os_rng())
    }

    /// Same as [`WeightedSet::new`] with a deterministic generator seed.
    pub fn with_seed(min_weight: f64, max_weight: f64, seed: u64) -> Result<Self, Error> {
        Self::build(min_weight, max_weight, RngType::seed_from_u64(seed))
    }

    fn build(min_weight: f64, max_weight: f64, rng: RngType) -> Result<Self, Error> {
        if !min_weight.is_finite()
            || !max_weight.is_finite()
            || min_weight <= 0.0
            || max_weight < min_weight
            // the group count is log2 of this ratio, which must not overflow
            || !(max_weight / min_weight).is_finite()
        {
            return Err(Error::InvalidBounds {
                min: min_weight,
                max: max_weight,
            });
        }

        let groups = WeightGroups::new(min_weight, max_weight);
        let bins = GroupBins::new(groups.count());
        let tree = SumTree::new(groups.count());

        Ok(WeightedSet {
            groups,
            bins,
            tree,
            table: HashMap::new(),
            rng,
        })
    }

    /// Number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[inline]
    pub fn contains(&self, element: &T) -> bool {
        self.table.contains_key(element)
    }

    /// Sum of all stored weights (the sum tree root).
    pub fn total_weight(&self) -> f64 {
        self.tree.total()
    }

    /// Weight of `element`, or `None` if it is not in the set.
    pub fn get_weight(&self, element: &T) -> Option<f64> {
        self.table
            .get(element)
            .map(|&(group, slot)| self.bins.get(group, slot).1)
    }

    /// Inserts an element with the given weight.
    ///
    /// Returns [`Error::OutOfRange`] for a weight outside the bounds and
    /// [`Error::DuplicateElement`] when the element is already stored; the
    /// set is unchanged on either error.
    pub fn insert(&mut self, element: &T, weight: f64) -> Result<(), Error> {
        self.check_weight(weight)?;
        if self.table.contains_key(element) {
            return Err(Error::DuplicateElement);
        }

        let group = self.groups.group_of(weight);
        let slot = self.bins.push(group, element.clone(), weight);
        self.table.insert(element.clone(), (group, slot));
        self.tree.update_leaf(group, weight);
        Ok(())
    }

    /// Replaces the weight of a stored element.
    ///
    /// A weight that stays in the element's current group is overwritten in
    /// place; otherwise the element is swap-removed from its bin and appended
    /// to the bin of its new group, repointing whichever entry got relocated.
    ///
    /// Returns [`Error::OutOfRange`] or [`Error::MissingElement`]; the set is
    /// unchanged on either error.
    pub fn set_weight(&mut self, element: &T, weight: f64) -> Result<(), Error> {
        self.check_weight(weight)?;
        let &(group, slot) = self.table.get(element).ok_or(Error::MissingElement)?;

        let new_group = self.groups.group_of(weight);
        if new_group == group {
            let old = self.bins.get(group, slot).1;
            self.bins.set_weight(group, slot, weight);
            self.tree.update_leaf(group, weight - old);
        } else {
            let (removed, relocated) = self.bins.swap_remove(group, slot);
            if let Some(relocated) = relocated {
                self.table.insert(relocated, (group, slot));
            }
            self.tree.update_leaf(group, -removed);

            let new_slot = self.bins.push(new_group, element.clone(), weight);
            self.table.insert(element.clone(), (new_group, new_slot));
            self.tree.update_leaf(new_group, weight);
        }
        Ok(())
    }

    /// Removes an element from the set.
    ///
    /// Returns [`Error::MissingElement`] when it is not stored.
    pub fn erase(&mut self, element: &T) -> Result<(), Error> {
        let (group, slot) = self.table.remove(element).ok_or(Error::MissingElement)?;

        let (removed, relocated) = self.bins.swap_remove(group, slot);
        if let Some(relocated) = relocated {
            self.table.insert(relocated, (group, slot));
        }
        self.tree.update_leaf(group, -removed);
        Ok(())
    }

    /// Draws one `(element, weight)` pair with probability proportional to
    /// weight, with replacement, using the set's owned generator.
    ///
    /// Returns `None` when the set is empty.
    pub fn sample(&mut self) -> Option<(T, f64)> {
        if self.table.is_empty() {
            return None;
        }
        draw(&self.groups, &self.bins, &self.tree, &mut self.rng)
    }

    /// Like [`WeightedSet::sample`] but drawing from a caller-supplied
    /// generator; the owned generator is untouched.
    pub fn sample_with<R>(&self, rng: &mut R) -> Option<(T, f64)>
    where
        R: Rng + ?Sized,
    {
        if self.table.is_empty() {
            return None;
        }
        draw(&self.groups, &self.bins, &self.tree, rng)
    }

    /// Lazy iterator of `n` with-replacement draws from the owned generator.
    pub fn sample_iter(&mut self, n: usize) -> SampleIter<'_, T> {
        SampleIter {
            set: self,
            remaining: n,
        }
    }

    /// Lazy sequence of exactly `n` items sampled *without* replacement.
    ///
    /// Each drawn element is removed from the set for the lifetime of the
    /// iterator so it cannot be drawn twice; once more elements have been
    /// drawn than remain, the sequence yields `None` markers. Dropping the
    /// iterator, whether fully consumed or abandoned, reinserts every drawn
    /// element with its original weight.
    pub fn sample_without_replacement(&mut self, n: usize) -> SampleWithoutReplacement<'_, T> {
        SampleWithoutReplacement {
            drawn: Vec::with_capacity(n.min(self.table.len())),
            set: self,
            remaining: n,
        }
    }

    /// Visits each stored `(element, weight)` pair once, in unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            bins: self.bins.as_slices(),
            group: 0,
            slot: 0,
        }
    }

    /// Deep copy of the set.
    ///
    /// With `seed` given the copy's generator is seeded deterministically;
    /// otherwise it is seeded from a fresh draw of this set's generator. A
    /// drawn 64-bit seed is fine for modest fan-out but collides at birthday
    /// scale, so callers forking many copies should seed explicitly.
    pub fn copy(&mut self, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| self.rng.random());
        WeightedSet {
            groups: self.groups.clone(),
            bins: self.bins.clone(),
            tree: self.tree.clone(),
            table: self.table.clone(),
            rng: RngType::seed_from_u64(seed),
        }
    }

    /// Removes every element. Group structure and bin capacity are retained.
    pub fn clear(&mut self) {
        self.table.clear();
        self.bins.clear();
        self.tree.clear();
    }

    /// Recomputes every bin sum exactly and rebuilds the sum tree from them.
    ///
    /// Incremental leaf deltas accumulate rounding error over long mutation
    /// chains; calling this occasionally keeps the cached sums within a
    /// single summation pass of exact.
    pub fn rebalance(&mut self) {
        let sums: Vec<f64> = (0..self.bins.group_count())
            .map(|group| self.bins.recompute_sum(group))
            .collect();
        self.tree.rebuild(&sums);
    }

    /// Reseeds the owned generator.
    pub fn seed(&mut self, seed: u64) {
        self.rng = RngType::seed_from_u64(seed);
    }

    fn check_weight(&self, weight: f64) -> Result<(), Error> {
        let (min, max) = (self.groups.min_weight(), self.groups.max_weight());
        // the negated form also rejects NaN
        if !(weight >= min && weight <= max) {
            return Err(Error::OutOfRange { weight, min, max });
        }
        Ok(())
    }
}

/// One composition-rejection draw. Callers guarantee a non-empty set.
fn draw<T, R>(
    groups: &WeightGroups,
    bins: &GroupBins<T>,
    tree: &SumTree,
    rng: &mut R,
) -> Option<(T, f64)>
where
    T: Clone + Eq + Hash,
    R: Rng + ?Sized,
{
    let total = tree.total();
    debug_assert!(total > 0.0);

    loop {
        let r = rng.random_range(0.0..total);
        let group = tree.descend(r);

        let bin_len = bins.len(group);
        if bin_len == 0 {
            // rounding pushed the descent onto a padding leaf
            continue;
        }

        let slot = rng.random_range(0..bin_len);
        let &(ref element, weight) = bins.get(group, slot);

        let u: f64 = rng.random();
        if u * groups.ceiling(group) <= weight {
            return Some((element.clone(), weight));
        }
    }
}

/// Sequential iterator over the stored pairs, bin by bin.
pub struct Iter<'a, T> {
    bins: &'a [Vec<(T, f64)>],
    group: usize,
    slot: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a T, f64);

    fn next(&mut self) -> Option<Self::Item> {
        while self.group < self.bins.len() {
            let bin = &self.bins[self.group];
            if self.slot < bin.len() {
                let (ref element, weight) = bin[self.slot];
                self.slot += 1;
                return Some((element, weight));
            }
            self.group += 1;
            self.slot = 0;
        }
        None
    }
}

impl<'a, T> IntoIterator for &'a WeightedSet<T>
where
    T: Clone + Eq + Hash,
{
    type Item = (&'a T, f64);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator of with-replacement draws; see [`WeightedSet::sample_iter`].
///
/// Stops early (yields fewer than `n` items) only if the set is empty.
pub struct SampleIter<'a, T>
where
    T: Clone + Eq + Hash,
{
    set: &'a mut WeightedSet<T>,
    remaining: usize,
}

impl<T> Iterator for SampleIter<'_, T>
where
    T: Clone + Eq + Hash,
{
    type Item = (T, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.set.sample()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Iterator of without-replacement draws; see
/// [`WeightedSet::sample_without_replacement`].
///
/// Holds the drawn elements aside and reinserts them on drop, so the set is
/// restored whether the sequence is consumed or abandoned.
pub struct SampleWithoutReplacement<'a, T>
where
    T: Clone + Eq + Hash,
{
    set: &'a mut WeightedSet<T>,
    drawn: Vec<(T, f64)>,
    remaining: usize,
}

impl<T> Iterator for SampleWithoutReplacement<'_, T>
where
    T: Clone + Eq + Hash,
{
    type Item = Option<(T, f64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        match self.set.sample() {
            Some((element, weight)) => {
                // the element was just sampled, so it is present
                let erased = self.set.erase(&element);
                debug_assert!(erased.is_ok());
                self.drawn.push((element.clone(), weight));
                Some(Some((element, weight)))
            }
            None => Some(None),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for SampleWithoutReplacement<'_, T> where T: Clone + Eq + Hash {}

impl<T> Drop for SampleWithoutReplacement<'_, T>
where
    T: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        for (element, weight) in self.drawn.drain(..) {
            // weights were valid when drawn and the elements were erased by
            // this iterator, so reinsertion cannot fail
            let restored = self.set.insert(&element, weight);
            debug_assert!(restored.is_ok());
        }
    }
}
