// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! The acceleration-structure core: geometry primitives, partition kernel,
//! builders, optimizer, wide-node converters, top-level orchestration, and
//! the on-disk persisted-blob format.

pub mod aabb;
pub mod bitset;
pub mod build;
pub mod builder;
pub mod node;
pub mod optimizer;
pub mod partition;
pub mod persist;
pub mod triangle;
pub mod wide4;
pub mod wide8;
