use crate::literal::{Lit, Var};
use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

/// Types that index densely into per-variable storage.
pub(crate) trait DenseIndex: Copy {
    /// number of slots a single variable occupies
    const STRIDE: usize;

    fn dense_index(self) -> usize;
}

impl DenseIndex for Var {
    const STRIDE: usize = 1;

    fn dense_index(self) -> usize {
        self.as_index()
    }
}

impl DenseIndex for Lit {
    const STRIDE: usize = 2;

    fn dense_index(self) -> usize {
        self.as_index()
    }
}

/// A vector densely indexed by [`Var`] or [`Lit`].
#[derive(Debug, Clone)]
pub(crate) struct IndexedVec<K, T> {
    data: Vec<T>,
    _index: PhantomData<K>,
}

pub(crate) type VarVec<T> = IndexedVec<Var, T>;
pub(crate) type LitVec<T> = IndexedVec<Lit, T>;

impl<K, T> Default for IndexedVec<K, T> {
    fn default() -> Self {
        Self { data: Vec::default(), _index: PhantomData }
    }
}

impl<K: DenseIndex, T: Default> IndexedVec<K, T> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.data.resize_with(count * K::STRIDE, Default::default);
    }
}

impl<K: DenseIndex, T> IndexedVec<K, T> {
    pub(crate) fn get_var_count(&self) -> usize {
        self.data.len() / K::STRIDE
    }

    pub(crate) fn get(&self, index: K) -> Option<&T> {
        self.data.get(index.dense_index())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }
}

impl<T> IndexedVec<Var, T> {
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Var, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(idx, value)| (Var::from_index(idx.try_into().unwrap()), value))
    }
}

impl<K: DenseIndex, T> Index<K> for IndexedVec<K, T> {
    type Output = T;

    fn index(&self, index: K) -> &Self::Output {
        &self.data[index.dense_index()]
    }
}

impl<K: DenseIndex, T> IndexMut<K> for IndexedVec<K, T> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.data[index.dense_index()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn var_and_lit_strides() {
        let mut by_var: VarVec<u32> = VarVec::default();
        let mut by_lit: LitVec<u32> = LitVec::default();
        by_var.set_var_count(3);
        by_lit.set_var_count(3);
        assert_eq!(by_var.get_var_count(), 3);
        assert_eq!(by_lit.get_var_count(), 3);

        let var = Var::from_dimacs(2);
        by_var[var] = 7;
        by_lit[var.positive()] = 1;
        by_lit[var.negative()] = 2;
        assert_eq!(by_var[var], 7);
        assert_ne!(by_lit[var.positive()], by_lit[var.negative()]);
    }
}
