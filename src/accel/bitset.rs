// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scratch `side` bitset used by the SAH builder's in-place three-axis
//! partition: a two-pass stable partition over each per-axis array, keyed
//! by triangle id, with no re-sorting.

/// One bit per original triangle id: `true` means "goes left" for the split
/// currently being applied.
pub struct SideSet {
    bits: Vec<bool>,
}

impl SideSet {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    pub fn set(&mut self, id: u32, left: bool) {
        self.bits[id as usize] = left;
    }

    pub fn is_left(&self, id: u32) -> bool {
        self.bits[id as usize]
    }

    /// Stable two-pass partition of `arr` according to `self`: all
    /// left-marked entries first (preserving relative order), then all
    /// right-marked entries (preserving relative order). Returns the split
    /// point.
    pub fn stable_partition(&self, arr: &mut [u32], scratch: &mut Vec<u32>) -> usize {
        scratch.clear();
        scratch.extend(arr.iter().copied().filter(|&id| self.is_left(id)));
        let split = scratch.len();
        scratch.extend(arr.iter().copied().filter(|&id| !self.is_left(id)));
        arr.copy_from_slice(scratch);
        split
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_partition_preserves_relative_order_on_each_side() {
        let mut side = SideSet::new(6);
        for id in [0, 2, 4] {
            side.set(id, true);
        }
        let mut arr = vec![4, 3, 2, 1, 0, 5];
        let mut scratch = Vec::new();
        let split = side.stable_partition(&mut arr, &mut scratch);
        assert_eq!(&arr[..split], &[4, 2, 0]);
        assert_eq!(&arr[split..], &[3, 1, 5]);
    }
}
