use std::collections::HashMap;
use std::fmt;

use crate::error::FactorError;
use crate::workforce::{self, Workforce};
use crate::{Result, INDEX_WIDTH};

/// An argument identifier: a binary-valued proposition.
pub type Arg = u32;

/// Tables with at least this many entries are eligible for the scoped
/// `rayon` fan-out; smaller ones always run on the calling thread because
/// the worker-pool overhead dominates at that scale (see [`crate::Workforce`]).
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

/// A dense conditional probability table `P(conditioned | conditioning)`
/// over binary-valued arguments.
///
/// The table is indexed by the binary encoding of a *world*: bit `k` of an
/// index is the truth value of whichever argument is mapped to bit
/// position `k` (conditioned arguments first, in order, then conditioning
/// arguments, in order). A factor constructed without an explicit table is
/// `uniform`: every world is assigned the same probability mass,
/// `2^-|conditioned|`, which lets a [`crate::Factor`]'s owner cache the
/// singleton belief of each of its conditioned arguments as `0.5` without
/// touching the table (see the `distribution` crate).
#[derive(Clone, Debug)]
pub struct Factor {
    conditioned: Vec<Arg>,
    conditioning: Vec<Arg>,
    table: Vec<f64>,
    mapping: HashMap<Arg, u32>,
    uniform: bool,
}

impl Factor {
    /// Builds a factor over `conditioned | conditioning`.
    ///
    /// With `table = None`, the factor starts out uniform. With
    /// `table = Some(t)`, `t` is adopted verbatim and must have length
    /// `2^(conditioned.len() + conditioning.len())`.
    pub fn new(conditioned: Vec<Arg>, conditioning: Vec<Arg>, table: Option<Vec<f64>>) -> Result<Self> {
        let size = conditioned.len() + conditioning.len();
        if size as u32 > INDEX_WIDTH - 2 {
            return Err(FactorError::CapacityExceeded);
        }
        let mapping = build_mapping(&conditioned, &conditioning)?;
        let len = 1usize << size;
        let (table, uniform) = match table {
            Some(table) => {
                if table.len() != len {
                    return Err(FactorError::ShapeMismatch);
                }
                (table, false)
            }
            None => {
                let belief = 1.0 / (1u64 << conditioned.len()) as f64;
                (vec![belief; len], true)
            }
        };
        Ok(Factor { conditioned, conditioning, table, mapping, uniform })
    }

    /// The conditioned ("left-hand side") arguments, in mapping order.
    pub fn conditioned(&self) -> &[Arg] {
        &self.conditioned
    }

    /// The conditioning ("right-hand side") arguments, in mapping order.
    pub fn conditioning(&self) -> &[Arg] {
        &self.conditioning
    }

    /// `|conditioned| + |conditioning|`.
    pub fn size(&self) -> u32 {
        (self.conditioned.len() + self.conditioning.len()) as u32
    }

    /// The dense probability table, indexed as described on [`Factor`].
    pub fn table(&self) -> &[f64] {
        &self.table
    }

    /// True iff the table has never been set explicitly since construction.
    pub fn uniform(&self) -> bool {
        self.uniform
    }

    /// Replaces the table verbatim and clears the `uniform` flag.
    pub fn set_probabilities(&mut self, table: Vec<f64>) -> Result<()> {
        if table.len() != self.table.len() {
            return Err(FactorError::ShapeMismatch);
        }
        self.table = table;
        self.uniform = false;
        Ok(())
    }

    /// Shifts mass towards (`positive = true`) or away from (`positive =
    /// false`) `arg` being true, by fraction `c`.
    ///
    /// `c = 0` is a no-op; `c = 1` makes `arg` certain. `arg` must be a
    /// conditioned argument of this factor.
    #[tracing::instrument(level = "trace", skip(self), fields(size = self.size()))]
    pub fn refine(&mut self, arg: Arg, positive: bool, c: f64, workforce: Workforce) -> Result<()> {
        let bit = *self.mapping.get(&arg).ok_or(FactorError::UnknownArgument)?;
        if bit as usize >= self.conditioned.len() {
            return Err(FactorError::ArgumentNotConditioned);
        }
        tracing::trace!(arg, positive, c, "refining factor");
        workforce::refine_pairs(workforce, &mut self.table, bit, positive, c);
        self.uniform = false;
        Ok(())
    }

    /// Returns a new factor whose conditioned set is `keep ∩ conditioned`
    /// and whose conditioning set is unchanged, summing out every
    /// dimension not in `keep`. Mass is conserved.
    #[tracing::instrument(level = "trace", skip(self), fields(size = self.size()))]
    pub fn marginalize(&self, keep: &[Arg], workforce: Workforce) -> Factor {
        if keep == self.conditioned.as_slice() {
            return self.clone();
        }
        let (new_conditioned, new_conditioning, projection) = self.marginal_plan(keep);
        let out_len = 1usize << (new_conditioned.len() + new_conditioning.len());
        let table = workforce::fold_projected(
            workforce,
            self.table.len(),
            out_len,
            |i| project_index(i, &projection),
            |i| self.table[i],
        );
        let mapping = build_mapping(&new_conditioned, &new_conditioning)
            .expect("marginalizing a well-formed factor cannot duplicate arguments");
        Factor { conditioned: new_conditioned, conditioning: new_conditioning, table, mapping, uniform: false }
    }

    /// Like [`Factor::marginalize`], but overwrites `self` in place.
    pub fn marginalize_self(&mut self, keep: &[Arg], workforce: Workforce) {
        *self = self.marginalize(keep, workforce);
    }

    /// Builds the `(src_bit, dst_bit)` projection used by `marginalize`,
    /// along with the resulting conditioned/conditioning argument lists.
    fn marginal_plan(&self, keep: &[Arg]) -> (Vec<Arg>, Vec<Arg>, Vec<(u32, u32)>) {
        let mut new_conditioned = Vec::new();
        let mut projection = Vec::new();
        let mut dst = 0u32;
        for &arg in keep {
            if self.conditioned.contains(&arg) {
                new_conditioned.push(arg);
                projection.push((self.mapping[&arg], dst));
                dst += 1;
            }
        }
        let new_conditioning = self.conditioning.clone();
        for &arg in &new_conditioning {
            projection.push((self.mapping[&arg], dst));
            dst += 1;
        }
        (new_conditioned, new_conditioning, projection)
    }

    /// Forms the product `self ⊗ other`, reconciling arguments shared by
    /// both operands via the chain rule: the result's conditioning set
    /// drops any argument that is conditioned in the other operand.
    #[tracing::instrument(level = "trace", skip(self, other), fields(self_size = self.size(), other_size = other.size()))]
    pub fn combine(&self, other: &Factor, workforce: Workforce) -> Result<Factor> {
        let mut conditioned = self.conditioned.clone();
        conditioned.extend_from_slice(&other.conditioned);

        let mut conditioning = Vec::new();
        conditioning.extend(self.conditioning.iter().copied().filter(|a| !other.conditioned.contains(a)));
        conditioning.extend(other.conditioning.iter().copied().filter(|a| !self.conditioned.contains(a)));

        let result_size = conditioned.len() + conditioning.len();
        if result_size as u32 > INDEX_WIDTH - 2 {
            return Err(FactorError::CapacityExceeded);
        }
        let mapping = build_mapping(&conditioned, &conditioning)?;

        let split: Vec<(Option<u32>, Option<u32>)> = conditioned
            .iter()
            .chain(conditioning.iter())
            .map(|arg| (self.mapping.get(arg).copied(), other.mapping.get(arg).copied()))
            .collect();

        tracing::trace!(result_size, "combining factors");
        let self_table = &self.table;
        let other_table = &other.table;
        let mut table = vec![0.0_f64; 1usize << result_size];
        workforce::fill_disjoint(workforce, &mut table, |i| {
            let mut i_self = 0usize;
            let mut i_other = 0usize;
            for (dst_bit, (self_bit, other_bit)) in split.iter().enumerate() {
                let bit_val = (i >> dst_bit) & 1;
                if let Some(sb) = self_bit {
                    i_self |= bit_val << sb;
                }
                if let Some(ob) = other_bit {
                    i_other |= bit_val << ob;
                }
            }
            self_table[i_self] * other_table[i_other]
        });

        Ok(Factor { conditioned, conditioning, table, mapping, uniform: false })
    }

    /// Same as [`Factor::to_string`]; kept for interface parity with the
    /// non-Rust API this crate mirrors.
    pub fn to_str(&self) -> String {
        self.to_string()
    }
}

fn project_index(i: usize, projection: &[(u32, u32)]) -> usize {
    let mut p = 0usize;
    for &(src_bit, dst_bit) in projection {
        p |= ((i >> src_bit) & 1) << dst_bit;
    }
    p
}

fn build_mapping(conditioned: &[Arg], conditioning: &[Arg]) -> Result<HashMap<Arg, u32>> {
    let mut mapping = HashMap::with_capacity(conditioned.len() + conditioning.len());
    let mut index = 0u32;
    for &arg in conditioned.iter().chain(conditioning.iter()) {
        if mapping.insert(arg, index).is_some() {
            return Err(FactorError::DuplicateArgument);
        }
        index += 1;
    }
    Ok(mapping)
}

impl PartialEq for Factor {
    fn eq(&self, other: &Self) -> bool {
        self.conditioned == other.conditioned && self.conditioning == other.conditioning && self.table == other.table
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries = self.table.iter();
        if let Some(first) = entries.next() {
            write!(f, "{first}")?;
        }
        for value in entries {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}
