// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Iterative node reinsertion optimizer (C5): batched, randomized,
//! transactional-per-batch local restructuring of a `BVH2` to lower its
//! total SAH cost, bounded by a wall-clock deadline and a batch count.
//!
//! Grounded on the Bittner et al. "insertion-based" BVH optimization
//! scheme and `original_source/Src/Config.h`'s
//! `bvh_optimizer_max_time`/`bvh_optimizer_max_num_batches` knobs. Each
//! reinsertion is a detach/search/insert cycle that preserves sibling
//! adjacency (Inv. 5) by construction: detaching a node frees exactly one
//! of its former pair's two slots (the other is kept by the detached node
//! itself), and reinsertion always consumes that same pair to host the new
//! parent's two children.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::accel::aabb::Aabb;
use crate::accel::node::Bvh2Node;
use crate::config::BvhConfig;
use crate::stats::OptimizerReport;

const ROOT: usize = 0;

/// Runs the optimizer in place over `nodes` (rooted at index 0) and
/// returns a report describing what happened. Never fails: a deadline or
/// batch-count exhaustion simply stops the loop and returns the best tree
/// found so far (a budget running out is not a fatal condition).
pub fn optimize(nodes: &mut Vec<Bvh2Node>, cfg: &BvhConfig) -> OptimizerReport {
    let initial_cost = tree_cost(nodes, ROOT, cfg);

    if nodes.len() < 3 {
        // No internal node below the root to reinsert.
        return OptimizerReport {
            batches_run: 0,
            budget_exceeded: false,
            initial_cost,
            final_cost: initial_cost,
        };
    }

    let deadline = Instant::now() + std::time::Duration::from_millis(cfg.bvh_optimizer_max_time_ms);
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.optimizer_seed);
    let mut parent = build_parent_index(nodes);

    let mut batches_run = 0u32;
    let mut budget_exceeded = false;
    let mut current_cost = initial_cost;

    while batches_run < cfg.bvh_optimizer_max_num_batches {
        if Instant::now() >= deadline {
            budget_exceeded = true;
            break;
        }

        let k = 0.01 * (1.0 - batches_run as f32 / cfg.bvh_optimizer_max_num_batches as f32);
        let internal_count = nodes.len() / 2;
        let batch_size = ((k * internal_count as f32).ceil() as usize).max(1);

        let candidates = select_batch(nodes, &mut rng, batch_size);

        // Transactional batch: snapshot, apply, keep or revert.
        let snapshot_nodes = nodes.clone();
        let snapshot_parent = parent.clone();

        for v in candidates {
            if v == ROOT || parent[v] == u32::MAX {
                continue;
            }
            reinsert_one(nodes, &mut parent, v, cfg);
        }

        let new_cost = tree_cost(nodes, ROOT, cfg);
        if new_cost <= current_cost {
            current_cost = new_cost;
        } else {
            *nodes = snapshot_nodes;
            parent = snapshot_parent;
        }

        batches_run += 1;
    }

    log::info!(
        "BVH optimizer: {batches_run} batches, cost {initial_cost:.3} -> {current_cost:.3}{}",
        if budget_exceeded { " (budget exceeded)" } else { "" }
    );
    if budget_exceeded {
        log::warn!("BVH optimizer hit its wall-clock budget before exhausting its batch count");
    }

    OptimizerReport {
        batches_run,
        budget_exceeded,
        initial_cost,
        final_cost: current_cost,
    }
}

/// Total SAH cost of the tree reachable from `root`: `C_trav` per internal
/// node's surface area plus `C_leaf` per leaf's surface area times its
/// primitive count.
fn tree_cost(nodes: &[Bvh2Node], root: usize, cfg: &BvhConfig) -> f32 {
    let mut stack = vec![root];
    let mut cost = 0.0;
    while let Some(i) = stack.pop() {
        let n = &nodes[i];
        if n.is_leaf() {
            cost += n.aabb().surface_area() * n.count as f32 * cfg.sah_cost_leaf;
        } else {
            cost += n.aabb().surface_area() * cfg.sah_cost_node;
            stack.push(n.left as usize);
            stack.push(n.right() as usize);
        }
    }
    cost
}

/// Builds the parent-index lookup by walking the tree from the root.
/// `u32::MAX` marks the root (no parent) and any slot unreachable from the
/// root (shouldn't occur between batches, since every reinsertion leaves
/// the tree fully connected).
fn build_parent_index(nodes: &[Bvh2Node]) -> Vec<u32> {
    let mut parent = vec![u32::MAX; nodes.len()];
    let mut stack = vec![ROOT];
    while let Some(i) = stack.pop() {
        let n = &nodes[i];
        if !n.is_leaf() {
            parent[n.left as usize] = i as u32;
            parent[n.right() as usize] = i as u32;
            stack.push(n.left as usize);
            stack.push(n.right() as usize);
        }
    }
    parent
}

/// Picks `batch_size` distinct internal non-root node indices, weighted
/// toward the largest local inefficiency `SA(parent) - (SA(left) +
/// SA(right))`. Falls back to uniform sampling once the weighted pool is
/// exhausted.
fn select_batch(nodes: &[Bvh2Node], rng: &mut ChaCha8Rng, batch_size: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = Vec::new();
    for i in 0..nodes.len() {
        if i == ROOT || nodes[i].is_leaf() {
            continue;
        }
        // `i` is an internal node; its two children are candidates for
        // reinsertion (their *parent* is `i`).
        for &child in &[nodes[i].left as usize, nodes[i].right() as usize] {
            let parent_sa = nodes[i].aabb().surface_area();
            let sibling = if child == nodes[i].left as usize {
                nodes[i].right() as usize
            } else {
                nodes[i].left as usize
            };
            let children_sa = nodes[child].aabb().surface_area() + nodes[sibling].aabb().surface_area();
            scored.push((child, (parent_sa - children_sa).max(0.0)));
        }
    }

    if scored.is_empty() {
        return Vec::new();
    }

    scored.shuffle(rng);
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(batch_size.min(scored.len()));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

/// Detaches `v_idx`, then searches for and performs the cheapest
/// reinsertion point.
fn reinsert_one(nodes: &mut [Bvh2Node], parent: &mut [u32], v_idx: usize, cfg: &BvhConfig) {
    let Some(free_slot) = detach(nodes, parent, v_idx) else {
        return;
    };

    let v_aabb = nodes[v_idx].aabb();
    let best = best_reinsertion_point(nodes, v_aabb, cfg);
    insert(nodes, parent, v_idx, free_slot, best.u_idx, cfg);
}

/// Detaches `v_idx` from its parent `p_idx`: `p_idx`'s slot is overwritten
/// with its sibling's content (so every ancestor above `p_idx` needs no
/// update at all), and the sibling's now-stale slot is returned as the one
/// free internal slot the caller must consume.
fn detach(nodes: &mut [Bvh2Node], parent: &mut [u32], v_idx: usize) -> Option<usize> {
    let p_idx = parent[v_idx] as usize;
    let p_node = nodes[p_idx];
    if p_node.is_leaf() {
        return None; // shouldn't happen: parents of tracked children are always internal
    }
    let s_idx = if p_node.left as usize == v_idx {
        p_node.right() as usize
    } else {
        p_node.left as usize
    };

    let s_content = nodes[s_idx];
    nodes[p_idx] = s_content;
    if !s_content.is_leaf() {
        parent[s_content.left as usize] = p_idx as u32;
        parent[s_content.right() as usize] = p_idx as u32;
    }

    parent[v_idx] = u32::MAX; // v is detached; reattached by `insert` below
    // `p_idx`'s box just shrank from union(v, sibling) down to sibling's
    // own box; every ancestor above it cached a union that included the
    // old, larger value.
    refresh_ancestors(nodes, parent, p_idx);
    Some(s_idx)
}

/// Result of [`best_reinsertion_point`]: the existing node `u_idx` that `v`
/// should become a new sibling of, and the total induced SAH cost.
struct ReinsertionPoint {
    u_idx: usize,
    #[allow(dead_code)]
    cost: f32,
}

/// Best-first branch-and-bound search for the reinsertion point minimizing
/// the induced SAH delta. The priority queue orders by a lower bound
/// (`SA(union(B_u, B_v)) + inherited_cost`); a branch is pruned once its
/// lower bound can no longer beat the best cost found.
fn best_reinsertion_point(nodes: &[Bvh2Node], v_aabb: Aabb, cfg: &BvhConfig) -> ReinsertionPoint {
    struct Entry {
        lower_bound: f32,
        node: usize,
        inherited: f32,
    }
    impl PartialEq for Entry {
        fn eq(&self, other: &Self) -> bool {
            self.lower_bound == other.lower_bound
        }
    }
    impl Eq for Entry {}
    impl PartialOrd for Entry {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Entry {
        fn cmp(&self, other: &Self) -> Ordering {
            // Reversed so `BinaryHeap` (a max-heap) pops the smallest bound.
            other.lower_bound.partial_cmp(&self.lower_bound).unwrap_or(Ordering::Equal)
        }
    }

    let mut heap = BinaryHeap::new();
    heap.push(Entry {
        lower_bound: 0.0,
        node: ROOT,
        inherited: 0.0,
    });

    let mut best = ReinsertionPoint {
        u_idx: ROOT,
        cost: f32::INFINITY,
    };

    while let Some(Entry { lower_bound, node, inherited }) = heap.pop() {
        if lower_bound >= best.cost {
            break;
        }
        let n = nodes[node];
        let n_aabb = n.aabb();
        let enlarged = n_aabb.union(v_aabb).surface_area();
        let total = inherited + enlarged * cfg.sah_cost_node;

        if total < best.cost {
            best = ReinsertionPoint { u_idx: node, cost: total };
        }

        if !n.is_leaf() {
            let delta = (enlarged - n_aabb.surface_area()).max(0.0) * cfg.sah_cost_node;
            let child_inherited = inherited + delta;
            // Children can't possibly beat `child_inherited + SA(v)`: this
            // is the pruning lower bound.
            let child_lb = child_inherited + v_aabb.surface_area() * cfg.sah_cost_leaf;
            if child_lb < best.cost {
                heap.push(Entry { lower_bound: child_lb, node: n.left as usize, inherited: child_inherited });
                heap.push(Entry { lower_bound: child_lb, node: n.right() as usize, inherited: child_inherited });
            }
        }
    }

    best
}

/// Creates a new internal parent at `u_idx`'s old index owning `{u's
/// former content, v}`, consuming `free_slot` (paired with `v_idx` itself,
/// per [`detach`]) to host the two children, then refreshes ancestor AABBs
/// up to the root.
fn insert(nodes: &mut [Bvh2Node], parent: &mut [u32], v_idx: usize, free_slot: usize, u_idx: usize, _cfg: &BvhConfig) {
    let (slot_v, slot_u) = if v_idx < free_slot { (v_idx, free_slot) } else { (free_slot, v_idx) };
    debug_assert_eq!(slot_u, slot_v + 1, "detach always frees v's own sibling slot");

    let u_former = nodes[u_idx];
    nodes[slot_u] = u_former;
    if !u_former.is_leaf() {
        parent[u_former.left as usize] = slot_u as u32;
        parent[u_former.right() as usize] = slot_u as u32;
    }
    // `v`'s content already sits at `slot_v` (== `v_idx`); nothing to copy.

    let new_aabb = nodes[slot_v].aabb().union(nodes[slot_u].aabb());
    nodes[u_idx] = Bvh2Node {
        aabb_min: new_aabb.min.into(),
        left: slot_v as u32,
        aabb_max: new_aabb.max.into(),
        count: 0,
    };
    parent[slot_v] = u_idx as u32;
    parent[slot_u] = u_idx as u32;

    refresh_ancestors(nodes, parent, u_idx);
}

/// Walks from `start` up to the root, recomputing each ancestor's AABB as
/// the union of its two children's AABBs (Inv. 2).
fn refresh_ancestors(nodes: &mut [Bvh2Node], parent: &[u32], start: usize) {
    let mut i = start;
    loop {
        let p = parent[i];
        if p == u32::MAX {
            break;
        }
        let p = p as usize;
        let node = nodes[p];
        let aabb = nodes[node.left as usize].aabb().union(nodes[node.right() as usize].aabb());
        nodes[p].aabb_min = aabb.min.into();
        nodes[p].aabb_max = aabb.max.into();
        i = p;
    }
}
