// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persisted-blob format: a tiny fixed header followed by the node array
//! and triangle-index array, packed little-endian. The node types are
//! the same `Pod` layout used for GPU upload (`node.rs`'s doc comment), so
//! `write`/`read` are a straight `bytemuck::cast_slice` either way — no
//! separate wire representation to keep in sync.
//!
//! No filesystem policy here: callers pick the path, open the file, and
//! hand this module a `Write`/`Read`.

use std::io::{self, Read, Write};

use bytemuck::{Pod, Zeroable};

use crate::accel::build::Hierarchy;
use crate::accel::node::{Bvh2Node, Bvh4Node, Bvh8Node};
use crate::error::{BvhError, Result};

const MAGIC: [u8; 4] = *b"BVH\0";
const VERSION: u32 = 1;

const TAG_BINARY: u8 = 2;
const TAG_WIDE4: u8 = 4;
const TAG_WIDE8: u8 = 8;

/// Writes `hierarchy` and `triangle_indices` to `writer` as one
/// self-contained blob.
pub fn write(writer: &mut impl Write, hierarchy: &Hierarchy, triangle_indices: &[u32]) -> io::Result<()> {
    let tag = match hierarchy {
        Hierarchy::Binary(_) => TAG_BINARY,
        Hierarchy::Wide4(_) => TAG_WIDE4,
        Hierarchy::Wide8(_) => TAG_WIDE8,
    };

    writer.write_all(&MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&[tag])?;
    writer.write_all(&(hierarchy.node_count() as u32).to_le_bytes())?;
    writer.write_all(&(triangle_indices.len() as u32).to_le_bytes())?;

    match hierarchy {
        Hierarchy::Binary(nodes) => write_pod_slice(writer, nodes)?,
        Hierarchy::Wide4(nodes) => write_pod_slice(writer, nodes)?,
        Hierarchy::Wide8(nodes) => write_pod_slice(writer, nodes)?,
    }
    write_pod_slice(writer, triangle_indices)?;

    Ok(())
}

fn write_pod_slice<T: Pod>(writer: &mut impl Write, items: &[T]) -> io::Result<()> {
    writer.write_all(bytemuck::cast_slice(items))
}

/// Reads back a blob written by [`write`]. Rejects a bad magic, an
/// unsupported version, or a truncated/over-long stream, as
/// `BvhError::InvariantViolation` (the blob is caller-supplied data, not a
/// builder invariant, but the taxonomy has no dedicated "corrupt input"
/// variant and this is not a condition callers should routinely branch on).
pub fn read(reader: &mut impl Read) -> Result<(Hierarchy, Vec<u32>)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(read_error)?;
    if magic != MAGIC {
        return Err(BvhError::InvariantViolation("bad magic in persisted BVH blob".into()));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes).map_err(read_error)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(BvhError::InvariantViolation(format!(
            "unsupported persisted BVH blob version {version}"
        )));
    }

    let mut tag = [0u8; 1];
    reader.read_exact(&mut tag).map_err(read_error)?;

    let mut node_count_bytes = [0u8; 4];
    reader.read_exact(&mut node_count_bytes).map_err(read_error)?;
    let node_count = u32::from_le_bytes(node_count_bytes) as usize;

    let mut index_count_bytes = [0u8; 4];
    reader.read_exact(&mut index_count_bytes).map_err(read_error)?;
    let index_count = u32::from_le_bytes(index_count_bytes) as usize;

    let hierarchy = match tag[0] {
        TAG_BINARY => Hierarchy::Binary(read_pod_vec::<Bvh2Node>(reader, node_count)?),
        TAG_WIDE4 => Hierarchy::Wide4(read_pod_vec::<Bvh4Node>(reader, node_count)?),
        TAG_WIDE8 => Hierarchy::Wide8(read_pod_vec::<Bvh8Node>(reader, node_count)?),
        other => {
            return Err(BvhError::InvariantViolation(format!(
                "unknown persisted BVH blob width tag {other}"
            )));
        }
    };
    let triangle_indices = read_pod_vec::<u32>(reader, index_count)?;

    Ok((hierarchy, triangle_indices))
}

fn read_pod_vec<T: Pod + Zeroable>(reader: &mut impl Read, count: usize) -> Result<Vec<T>> {
    let mut items = vec![T::zeroed(); count];
    reader
        .read_exact(bytemuck::cast_slice_mut(&mut items))
        .map_err(read_error)?;
    Ok(items)
}

fn read_error(e: io::Error) -> BvhError {
    BvhError::InvariantViolation(format!("truncated or unreadable persisted BVH blob: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::build::build_hierarchy;
    use crate::accel::triangle::Triangle;
    use crate::config::BvhConfig;
    use glam::Vec3;
    use std::io::Cursor;

    fn sample_triangles() -> Vec<Triangle> {
        (0..20)
            .map(|i| {
                let x = i as f32 * 1.3;
                Triangle::new(
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x + 1.0, 0.0, 0.0),
                    Vec3::new(x, 1.0, 0.0),
                )
            })
            .collect()
    }

    #[test]
    fn wide8_hierarchy_round_trips_through_a_blob() {
        let triangles = sample_triangles();
        let cfg = BvhConfig::default();
        let out = build_hierarchy(&triangles, &cfg).unwrap();

        let mut buf = Vec::new();
        write(&mut buf, &out.hierarchy, &out.triangle_indices).unwrap();

        let mut cursor = Cursor::new(buf);
        let (read_hierarchy, read_indices) = read(&mut cursor).unwrap();

        assert_eq!(read_hierarchy.node_count(), out.hierarchy.node_count());
        assert_eq!(read_indices, out.triangle_indices);
        match (read_hierarchy, out.hierarchy) {
            (Hierarchy::Wide8(a), Hierarchy::Wide8(b)) => assert_eq!(a, b),
            _ => panic!("expected Wide8 on both sides"),
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cursor = Cursor::new(vec![0u8; 17]);
        let err = read(&mut cursor).unwrap_err();
        assert!(matches!(err, BvhError::InvariantViolation(_)));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let triangles = sample_triangles();
        let cfg = BvhConfig { bvh_type: crate::config::BvhType::Bvh, ..BvhConfig::default() };
        let out = build_hierarchy(&triangles, &cfg).unwrap();

        let mut buf = Vec::new();
        write(&mut buf, &out.hierarchy, &out.triangle_indices).unwrap();
        buf.truncate(buf.len() - 4);

        let mut cursor = Cursor::new(buf);
        assert!(read(&mut cursor).is_err());
    }
}
