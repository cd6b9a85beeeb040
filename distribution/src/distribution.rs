use std::collections::{BTreeMap, BTreeSet, HashMap};

use factor::{Arg, Factor, Workforce, INDEX_WIDTH};

use crate::error::DistributionError;
use crate::Result;

/// A belief network built from a set of [`Factor`]s whose conditioned
/// argument sets are pairwise disjoint.
///
/// Each argument is owned by exactly one factor (the factor that
/// conditions on it). Querying an argument's belief combines that
/// factor with whatever other factors its conditioning closure touches,
/// then marginalizes down to the queried arguments; the result is
/// memoized until a refine invalidates it.
#[derive(Clone, Debug)]
pub struct Distribution {
    factors: Vec<Factor>,
    owner: HashMap<Arg, usize>,
    belief_cache: HashMap<Arg, f64>,
    cache_valid: HashMap<Arg, bool>,
    workforce: Workforce,
}

impl Distribution {
    /// Builds a distribution from a set of factors. Fails with
    /// [`DistributionError::DuplicateConditioned`] if an argument is
    /// conditioned by more than one factor.
    pub fn new(factors: Vec<Factor>) -> Result<Self> {
        let mut owner = HashMap::new();
        let mut belief_cache = HashMap::new();
        let mut cache_valid = HashMap::new();
        for (index, factor) in factors.iter().enumerate() {
            for &arg in factor.conditioned() {
                if owner.insert(arg, index).is_some() {
                    return Err(DistributionError::DuplicateConditioned);
                }
                if factor.uniform() {
                    belief_cache.insert(arg, 0.5);
                    cache_valid.insert(arg, true);
                } else {
                    cache_valid.insert(arg, false);
                }
            }
        }
        Ok(Distribution { factors, owner, belief_cache, cache_valid, workforce: Workforce::Parallel })
    }

    /// Builds a distribution out of one uniform, unconditioned two-world
    /// factor per argument — a starting point for networks assembled
    /// incrementally via [`Distribution::set_probabilities`].
    pub fn from_arguments(arguments: &[Arg]) -> Result<Self> {
        let mut factors = Vec::with_capacity(arguments.len());
        for &arg in arguments {
            factors.push(Factor::new(vec![arg], vec![], None)?);
        }
        Self::new(factors)
    }

    /// The number of factors in this distribution.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// The factor at `index`, if any.
    pub fn factor(&self, index: usize) -> Option<&Factor> {
        self.factors.get(index)
    }

    /// The index of the factor that conditions on `arg`, if any.
    pub fn factor_index_for(&self, arg: Arg) -> Option<usize> {
        self.owner.get(&arg).copied()
    }

    /// Switches future factor operations to the scoped worker pool
    /// (subject to [`factor::PARALLEL_THRESHOLD`]).
    pub fn enable_parallelism(&mut self) {
        self.workforce = Workforce::Parallel;
    }

    /// Forces future factor operations onto the calling thread.
    pub fn disable_parallelism(&mut self) {
        self.workforce = Workforce::Serial;
    }

    /// Replaces factor `f`'s table and invalidates the belief cache of
    /// every argument it conditions on.
    pub fn set_probabilities(&mut self, f: usize, probabilities: Vec<f64>) -> Result<()> {
        let factor = self.factors.get_mut(f).ok_or(DistributionError::UnknownArgument)?;
        factor.set_probabilities(probabilities)?;
        for arg in self.factors[f].conditioned().to_vec() {
            self.cache_valid.insert(arg, false);
        }
        Ok(())
    }

    /// Refines `argument`'s owning factor (see [`Factor::refine`]) and
    /// invalidates that argument's cached belief.
    pub fn refine(&mut self, argument: Arg, positive: bool, coefficient: f64) -> Result<()> {
        let index = self.owner.get(&argument).copied().ok_or(DistributionError::UnknownArgument)?;
        self.factors[index].refine(argument, positive, coefficient, self.workforce)?;
        self.cache_valid.insert(argument, false);
        Ok(())
    }

    /// Applies the refine update directly to `argument`'s cached belief,
    /// without touching the owning factor's table.
    ///
    /// Requires the cache to already be valid (typically because
    /// [`Distribution::beliefs`] was just called for this argument); this
    /// is a deliberately cheaper path for callers that only need the
    /// scalar belief to move, not the full joint table, and accept that
    /// the owning factor's table will not reflect this update.
    pub fn fast_refine(&mut self, argument: Arg, positive: bool, coefficient: f64) -> Result<()> {
        if !self.cache_valid.get(&argument).copied().unwrap_or(false) {
            return Err(DistributionError::CacheInvalid);
        }
        let belief = self.belief_cache.entry(argument).or_insert(0.5);
        if positive {
            *belief += coefficient * (1.0 - *belief);
        } else {
            *belief *= 1.0 - coefficient;
        }
        Ok(())
    }

    /// Returns a new factor formed by marginalizing factor `f` down to
    /// `keep`, without mutating the distribution.
    pub fn marginalize(&self, f: usize, keep: &[Arg]) -> Result<Factor> {
        let factor = self.factors.get(f).ok_or(DistributionError::UnknownArgument)?;
        Ok(factor.marginalize(keep, self.workforce))
    }

    /// Looks up the belief `P(argument = true)` for every argument in
    /// `arguments`, combining and marginalizing as needed to resolve any
    /// argument whose cache is stale, and memoizing the results.
    #[tracing::instrument(level = "debug", skip(self, arguments), fields(count = arguments.len()))]
    pub fn beliefs(&mut self, arguments: &[Arg]) -> Result<BTreeMap<Arg, f64>> {
        for &arg in arguments {
            if !self.owner.contains_key(&arg) {
                return Err(DistributionError::UnknownArgument);
            }
        }

        let mut combined: Option<Factor> = None;
        let mut beliefs = BTreeMap::new();
        for &arg in arguments {
            if self.cache_valid.get(&arg).copied().unwrap_or(false) {
                beliefs.insert(arg, self.belief_cache[&arg]);
                continue;
            }
            if combined.is_none() {
                combined = Some(self.find_and_combine(arguments)?);
            }
            let single = combined.as_ref().unwrap().marginalize(&[arg], self.workforce);
            let belief = single.table()[1];
            beliefs.insert(arg, belief);
            self.belief_cache.insert(arg, belief);
            self.cache_valid.insert(arg, true);
        }
        Ok(beliefs)
    }

    /// Walks `argument`'s owning factor's conditioning set, transitively,
    /// accumulating every argument reached along the way.
    fn find_conditioning(&self, argument: Arg, seen: &mut BTreeSet<Arg>) -> Result<()> {
        let index = self.owner.get(&argument).copied().ok_or(DistributionError::UnresolvedConditioning)?;
        for &cond in self.factors[index].conditioning() {
            if seen.insert(cond) {
                self.find_conditioning(cond, seen)?;
            }
        }
        Ok(())
    }

    /// Combines every factor that owns one of `arguments`, or transitively
    /// conditions on one of them, into a single factor, folding via
    /// [`Factor::combine`] in ascending factor-index order and
    /// marginalizing an operand pair down to `arguments ∪ conditioning`
    /// first whenever the unmarginalized combine would overflow the
    /// index width. Returns that factor marginalized down to `arguments`.
    fn find_and_combine(&self, arguments: &[Arg]) -> Result<Factor> {
        let mut conditioning_args = BTreeSet::new();
        let mut factor_indices = BTreeSet::new();
        for &arg in arguments {
            self.find_conditioning(arg, &mut conditioning_args)?;
            let index = self.owner.get(&arg).copied().ok_or(DistributionError::UnknownArgument)?;
            factor_indices.insert(index);
        }
        for &arg in &conditioning_args {
            let index = self.owner.get(&arg).copied().ok_or(DistributionError::UnresolvedConditioning)?;
            factor_indices.insert(index);
        }

        let limit = INDEX_WIDTH - 2;
        let closure: Vec<Arg> = arguments.iter().copied().chain(conditioning_args.iter().copied()).collect();

        let mut indices = factor_indices.into_iter();
        let first = indices.next().expect("a belief query always touches at least one factor");
        let mut combined = self.factors[first].clone();
        for index in indices {
            let mut next = self.factors[index].clone();
            if combined.size() + next.size() > limit {
                combined = combined.marginalize(&closure, self.workforce);
                next = next.marginalize(&closure, self.workforce);
            }
            combined = combined.combine(&next, self.workforce)?;
        }

        Ok(combined.marginalize(arguments, self.workforce))
    }
}

impl core::fmt::Display for Distribution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut factors = self.factors.iter();
        if let Some(first) = factors.next() {
            write!(f, "{first}")?;
        }
        for factor in factors {
            write!(f, " {factor}")?;
        }
        Ok(())
    }
}

impl Distribution {
    /// Same as [`Distribution::to_string`]; kept for interface parity with
    /// the non-Rust API this crate mirrors.
    pub fn to_str(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factor::FactorError;

    fn belief_of(map: &BTreeMap<Arg, f64>, arg: Arg) -> f64 {
        *map.get(&arg).unwrap()
    }

    #[test]
    fn owning_two_factors_to_the_same_argument_is_rejected() {
        let f1 = Factor::new(vec![0], vec![], None).unwrap();
        let f2 = Factor::new(vec![0], vec![], None).unwrap();
        assert_eq!(Distribution::new(vec![f1, f2]).unwrap_err(), DistributionError::DuplicateConditioned);
    }

    #[test]
    fn uniform_factors_start_with_a_valid_half_belief_cache() {
        let dist = Distribution::from_arguments(&[0, 1]).unwrap();
        assert_eq!(dist.belief_cache[&0], 0.5);
        assert!(dist.cache_valid[&0]);
    }

    #[test]
    fn scenario_five_belief_query_across_chained_conditioning() {
        let t = vec![0.2, 0.0, 0.0, 0.8, 0.7, 0.0, 0.15, 0.15];
        let f1 = Factor::new(vec![0, 1], vec![2], Some(t.clone())).unwrap();
        let f2 = Factor::new(vec![2, 3], vec![4], Some(t)).unwrap();
        let f3 = Factor::new(vec![4], vec![], None).unwrap();
        let mut dist = Distribution::new(vec![f1, f2, f3]).unwrap();

        let beliefs = dist.beliefs(&[0, 2, 3, 4]).unwrap();
        assert!((belief_of(&beliefs, 0) - 0.49125).abs() < 1e-9);
        assert!((belief_of(&beliefs, 3) - 0.55).abs() < 1e-9);
        assert!((belief_of(&beliefs, 2) - 0.475).abs() < 1e-9);
        assert!((belief_of(&beliefs, 4) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn scenario_six_fast_refine() {
        let factor = Factor::new(vec![0, 1, 2], vec![], None).unwrap();
        let mut dist = Distribution::new(vec![factor]).unwrap();

        let initial = dist.beliefs(&[0, 1, 2]).unwrap();
        for arg in [0, 1, 2] {
            assert!((belief_of(&initial, arg) - 0.5).abs() < 1e-9);
        }

        dist.fast_refine(2, true, 0.75).unwrap();
        dist.fast_refine(1, false, 0.75).unwrap();
        dist.fast_refine(0, true, 0.75).unwrap();

        let after = dist.beliefs(&[0, 1, 2]).unwrap();
        assert!((belief_of(&after, 0) - 0.875).abs() < 1e-9);
        assert!((belief_of(&after, 1) - 0.125).abs() < 1e-9);
        assert!((belief_of(&after, 2) - 0.875).abs() < 1e-9);
    }

    #[test]
    fn fast_refine_requires_a_valid_cache() {
        let mut dist = Distribution::from_arguments(&[0]).unwrap();
        dist.refine(0, true, 1.0).unwrap();
        assert_eq!(dist.fast_refine(0, true, 0.5), Err(DistributionError::CacheInvalid));
    }

    #[test]
    fn fast_refine_moves_the_cached_belief_without_touching_the_factor() {
        let mut dist = Distribution::from_arguments(&[0]).unwrap();
        dist.beliefs(&[0]).unwrap();
        dist.fast_refine(0, true, 0.5).unwrap();
        let beliefs = dist.beliefs(&[0]).unwrap();
        assert!((belief_of(&beliefs, 0) - 0.75).abs() < 1e-9);
        let factor = dist.factor(dist.factor_index_for(0).unwrap()).unwrap();
        assert!(factor.uniform());
    }

    #[test]
    fn marginalize_accessor_does_not_mutate_distribution() {
        let dist = Distribution::from_arguments(&[0, 1]).unwrap();
        let idx = dist.factor_index_for(0).unwrap();
        let m = dist.marginalize(idx, &[0]).unwrap();
        assert_eq!(m.conditioned(), &[0]);
        assert_eq!(dist.num_factors(), 2);
    }

    #[test]
    fn unknown_argument_is_rejected_by_refine_and_beliefs() {
        let mut dist = Distribution::from_arguments(&[0]).unwrap();
        assert_eq!(dist.refine(99, true, 1.0), Err(DistributionError::UnknownArgument));
        assert_eq!(dist.beliefs(&[99]).unwrap_err(), DistributionError::UnknownArgument);
    }

    #[test]
    fn set_probabilities_rejects_wrong_length_table_without_mutating_state() {
        let mut dist = Distribution::from_arguments(&[0, 1]).unwrap();
        let idx = dist.factor_index_for(0).unwrap();
        let before = dist.factor(idx).unwrap().table().to_vec();
        let err = dist.set_probabilities(idx, vec![0.3, 0.3, 0.4]).unwrap_err();
        assert_eq!(err, DistributionError::Factor(FactorError::ShapeMismatch));
        assert_eq!(dist.factor(idx).unwrap().table(), before.as_slice());
        assert!(dist.cache_valid[&0]);
    }

    #[test]
    fn set_probabilities_invalidates_cache_and_clears_uniform_flag() {
        let mut dist = Distribution::from_arguments(&[0]).unwrap();
        let idx = dist.factor_index_for(0).unwrap();
        dist.set_probabilities(idx, vec![0.3, 0.7]).unwrap();
        assert!(!dist.cache_valid[&0]);
        assert!(!dist.factor(idx).unwrap().uniform());
        let beliefs = dist.beliefs(&[0]).unwrap();
        assert!((belief_of(&beliefs, 0) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn to_str_joins_factor_tables_with_spaces() {
        let f0 = Factor::new(vec![0], vec![], Some(vec![0.4, 0.6])).unwrap();
        let f1 = Factor::new(vec![1], vec![], Some(vec![0.2, 0.8])).unwrap();
        let dist = Distribution::new(vec![f0, f1]).unwrap();
        assert_eq!(dist.to_str(), "0.4 0.6 0.2 0.8");
    }

    #[test]
    fn stress_combine_closure_over_many_chained_factors() {
        let mut factors = Vec::new();
        factors.push(Factor::new(vec![0], vec![], None).unwrap());
        for arg in 1..12u32 {
            let table = vec![0.9, 0.1, 0.1, 0.9];
            factors.push(Factor::new(vec![arg], vec![arg - 1], Some(table)).unwrap());
        }
        let mut dist = Distribution::new(factors).unwrap();
        dist.refine(0, true, 1.0).unwrap();
        let beliefs = dist.beliefs(&[11]).unwrap();
        assert!(belief_of(&beliefs, 11) > 0.5);
    }

    #[test]
    fn parallel_and_serial_belief_queries_agree() {
        let table = vec![0.9, 0.1, 0.1, 0.9];
        let f0 = Factor::new(vec![0], vec![], None).unwrap();
        let f1 = Factor::new(vec![1], vec![0], Some(table)).unwrap();

        let mut parallel = Distribution::new(vec![f0.clone(), f1.clone()]).unwrap();
        parallel.refine(0, true, 1.0).unwrap();
        let parallel_beliefs = parallel.beliefs(&[1]).unwrap();

        let mut serial = Distribution::new(vec![f0, f1]).unwrap();
        serial.disable_parallelism();
        serial.refine(0, true, 1.0).unwrap();
        let serial_beliefs = serial.beliefs(&[1]).unwrap();

        assert!((belief_of(&parallel_beliefs, 1) - belief_of(&serial_beliefs, 1)).abs() < 1e-9);
    }
}
