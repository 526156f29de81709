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

/// Dyadic weight classes over `[min_weight, max_weight]`.
///
/// Group $g$ holds weights in $[w_{\min} 2^g, w_{\min} 2^{g+1})$, so any two
/// weights in the same group are within a factor of two of each other. That
/// bound is what keeps the rejection step of the sampler at $\le 2$ expected
/// retries.
#[derive(Debug, Clone)]
pub(crate) struct WeightGroups {
    min_weight: f64,
    max_weight: f64,
    count: usize,
}

impl WeightGroups {
    /// Bounds must already be validated: `0 < min_weight <= max_weight`, both finite.
    pub fn new(min_weight: f64, max_weight: f64) -> Self {
        debug_assert!(min_weight > 0.0 && min_weight.is_finite());
        debug_assert!(max_weight >= min_weight && max_weight.is_finite());

        let span = max_weight / min_weight;
        let top = span.log2().floor() as usize;
        // An exact power-of-two span puts max_weight on a group boundary; the
        // top group absorbs it, closed at max_weight instead of half-open.
        let count = if is_pow_two(span) { top.max(1) } else { top + 1 };

        WeightGroups {
            min_weight,
            max_weight,
            count,
        }
    }

    pub fn min_weight(&self) -> f64 {
        self.min_weight
    }

    pub fn max_weight(&self) -> f64 {
        self.max_weight
    }

    /// Number of groups $G$.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Group index for a weight in `[min_weight, max_weight]`.
    ///
    /// Computed as $\lfloor \log_2(w / w_{\min}) \rfloor$, clamped to the last
    /// group. The clamp covers `weight == max_weight` on an exact power-of-two
    /// span and any upward rounding of the logarithm.
    #[inline]
    pub fn group_of(&self, weight: f64) -> usize {
        let g = (weight / self.min_weight).log2().floor() as usize;
        g.min(self.count - 1)
    }

    /// Rejection ceiling $w^*$ for a group: $w_{\min} 2^{g+1}$.
    ///
    /// Every weight stored in group `g` satisfies `w <= ceiling(g)`, and all
    /// but the last group also satisfy `w >= ceiling(g) / 2`. The last group's
    /// ceiling may sit above `max_weight`, which only lowers the acceptance
    /// rate there.
    #[inline]
    pub fn ceiling(&self, group: usize) -> f64 {
        self.min_weight * f64::powi(2.0, group as i32 + 1)
    }
}

#[inline]
fn is_pow_two(x: f64) -> bool {
    if !x.is_finite() || x <= 0.0 {
        return false;
    }
    // IEEE-754: a power of two has zero mantissa bits.
    (x.to_bits() & ((1u64 << 52) - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_two_detection() {
        assert!(is_pow_two(1.0));
        assert!(is_pow_two(2.0));
        assert!(is_pow_two(0.5));
        assert!(is_pow_two(1024.0));
        assert!(!is_pow_two(3.0));
        assert!(!is_pow_two(0.0));
        assert!(!is_pow_two(-2.0));
        assert!(!is_pow_two(f64::NAN));
        assert!(!is_pow_two(f64::INFINITY));
    }

    #[test]
    fn count_for_plain_span() {
        // ratio 100 -> floor(log2(100)) + 1 = 7 groups
        let g = WeightGroups::new(1.0, 100.0);
        assert_eq!(g.count(), 7);
    }

    #[test]
    fn count_for_pow_two_span() {
        // ratio 8 = 2^3 -> 3 groups, max_weight closes the top group
        let g = WeightGroups::new(1.0, 8.0);
        assert_eq!(g.count(), 3);
        // ratio 2 -> single group covering [1, 2]
        let g = WeightGroups::new(1.0, 2.0);
        assert_eq!(g.count(), 1);
    }

    #[test]
    fn count_never_zero() {
        assert_eq!(WeightGroups::new(1.0, 1.0).count(), 1);
        assert_eq!(WeightGroups::new(1.0, 1.5).count(), 1);
        assert_eq!(WeightGroups::new(0.25, 0.3).count(), 1);
    }

    #[test]
    fn boundaries_land_in_expected_groups() {
        let g = WeightGroups::new(1.0, 100.0);
        assert_eq!(g.group_of(1.0), 0);
        assert_eq!(g.group_of(1.99), 0);
        assert_eq!(g.group_of(2.0), 1);
        assert_eq!(g.group_of(64.0), 6);
        assert_eq!(g.group_of(100.0), 6);
    }

    #[test]
    fn pow_two_max_lands_in_last_group() {
        let g = WeightGroups::new(1.0, 8.0);
        assert_eq!(g.group_of(8.0), 2);
        assert_eq!(g.group_of(7.9), 2);
        assert_eq!(g.group_of(4.0), 2);
        assert_eq!(g.group_of(3.9), 1);
    }

    #[test]
    fn scaled_min_weight() {
        let g = WeightGroups::new(0.5, 10.0);
        assert_eq!(g.count(), 5);
        assert_eq!(g.group_of(0.5), 0);
        assert_eq!(g.group_of(1.0), 1);
        assert_eq!(g.group_of(10.0), 4);
    }

    #[test]
    fn ceilings_double_per_group() {
        let g = WeightGroups::new(1.0, 100.0);
        assert_eq!(g.ceiling(0), 2.0);
        assert_eq!(g.ceiling(1), 4.0);
        assert_eq!(g.ceiling(6), 128.0);
    }

    #[test]
    fn pow_two_span_top_ceiling_is_max_weight() {
        let g = WeightGroups::new(1.0, 8.0);
        assert_eq!(g.ceiling(g.count() - 1), 8.0);
    }
}
