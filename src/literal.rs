//! Variables and literals, stored as dense slot numbers.
//!
//! A variable occupies two adjacent slots, one per polarity; a literal *is*
//! its slot number. [`crate::datastructure::VarVec`] and
//! [`crate::datastructure::LitVec`] index directly by these slots.

use std::fmt::Display;

/// A variable, identified by a dense index starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(u32);

impl Var {
    /// Largest representable variable; two slots per variable must fit a
    /// `u32` literal slot.
    pub(crate) const MAX_VAR: Var = Var(u32::MAX / 2 - 1);

    pub fn from_index(index: u32) -> Self {
        assert!(index <= Self::MAX_VAR.0);
        Self(index)
    }

    pub fn from_dimacs(var: i32) -> Self {
        assert!(var > 0);
        Self::from_index(u32::try_from(var - 1).expect("var is positive"))
    }

    pub fn to_dimacs(self) -> i32 {
        i32::try_from(self.0 + 1).expect("the index bound keeps DIMACS ids in range")
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }

    /// The literal of this variable with the given polarity.
    pub(crate) fn lit(self, polarity: bool) -> Lit {
        Lit(self.0 * 2 + u32::from(!polarity))
    }

    pub(crate) fn positive(self) -> Lit {
        self.lit(true)
    }

    pub(crate) fn negative(self) -> Lit {
        self.lit(false)
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// A literal: its variable's even slot for the positive polarity, the odd
/// slot right after it for the negative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(u32);

impl Lit {
    pub(crate) fn var(self) -> Var {
        Var(self.0 / 2)
    }

    pub(crate) fn is_negative(self) -> bool {
        self.0 % 2 == 1
    }

    pub(crate) fn is_positive(self) -> bool {
        !self.is_negative()
    }

    pub fn from_dimacs(lit: i32) -> Self {
        Var::from_dimacs(lit.abs()).lit(lit > 0)
    }

    pub fn to_dimacs(self) -> i32 {
        if self.is_negative() {
            -self.var().to_dimacs()
        } else {
            self.var().to_dimacs()
        }
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl std::ops::Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.var().lit(self.is_negative())
    }
}

/// Helper struct which implements [`Display`] for [`Lit`] slices.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lits<'a>(pub(crate) &'a [Lit]);

impl Display for Lits<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "(")?;
        let mut sep = "";
        for lit in self.0 {
            write!(f, "{sep}{lit}")?;
            sep = " ";
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dimacs_roundtrip() {
        for v in [1, 2, 41, Var::MAX_VAR.to_dimacs()] {
            assert_eq!(Lit::from_dimacs(v).to_dimacs(), v);
            assert_eq!(Lit::from_dimacs(-v).to_dimacs(), -v);
        }
    }

    #[test]
    fn dense_slots_are_adjacent() {
        let var = Var::from_dimacs(3);
        assert_eq!(var.positive().as_index() + 1, var.negative().as_index());
        assert_eq!(var.positive().as_index() / 2, var.as_index());
        assert_eq!(var.negative().as_index() / 2, var.as_index());
    }

    #[test]
    fn negation_flips_the_polarity_only() {
        let lit = Lit::from_dimacs(-7);
        assert_eq!((!lit).var(), lit.var());
        assert!((!lit).is_positive());
        assert_eq!(!!lit, lit);
    }

    #[test]
    #[should_panic]
    fn index_above_the_bound() {
        let _ = Var::from_index(Var::MAX_VAR.0 + 1);
    }
}

/// Provides a strategy for randomly generating literals.
#[cfg(test)]
pub(crate) mod strategy {
    use super::Lit;
    use proptest::prelude::*;

    /// Literals drawn from the DIMACS range `[-max_var, max_var] \ {0}`.
    pub(crate) fn lit(max_var: u32) -> impl Strategy<Value = Lit> {
        let max = i32::try_from(max_var).unwrap();
        (1..=max, proptest::bool::ANY)
            .prop_map(|(var, negate)| Lit::from_dimacs(if negate { -var } else { var }))
    }
}

#[cfg(kani)]
mod verification {
    use super::*;

    #[kani::proof]
    pub fn negation_is_an_involution() {
        let slot: u32 = kani::any();
        kani::assume(slot <= Var::MAX_VAR.0 * 2 + 1);
        let lit = Lit(slot);
        assert_eq!(!!lit, lit);
        assert_eq!((!lit).var(), lit.var());
        assert_ne!((!lit).is_negative(), lit.is_negative());
    }

    #[kani::proof]
    pub fn dimacs_conversion_roundtrips() {
        let raw: i32 = kani::any();
        kani::assume(raw != 0);
        kani::assume(raw.unsigned_abs() <= Var::MAX_VAR.0 + 1);
        let lit = Lit::from_dimacs(raw);
        assert_eq!(lit.to_dimacs(), raw);
    }
}
