//! Binary codec for a built forest index.
//!
//! ```text
//! Offset  Size     Type      Description
//! ──────────────────────────────────────────────────────────────
//! 0x00    8        [u8; 8]   Magic: "ANNFORST"
//! 0x08    4        u32 LE    Format version (1)
//! 0x0C    4        u32 LE    D: dimension
//! 0x10    4        u32 LE    N: vector count
//! 0x14    4        u32 LE    T: tree count
//! 0x18    4        u32 LE    Leaf capacity
//! 0x1C    1        u8        Metric id (0 angular, 1 euclidean)
//! 0x1D    3        -         Reserved, zero
//! 0x20    8        u64 LE    Build seed
//! 0x28    N*D*4    [f32]     Vector table, slot order
//! ...              per slot  u32 length + UTF-8 item id
//! ...              per tree  u32 node count, then nodes in arena order:
//!                              0u8, u32 count, [u32; count] slots   (leaf)
//!                              1u8, [f32; D] normal, f32 offset,
//!                                   u32 left, u32 right            (internal)
//! end-4   4        u32 LE    CRC32 of every preceding byte
//! ```
//!
//! Decoding fails closed: any inconsistency is reported as
//! [`ForestError::CorruptIndex`] and nothing is partially recovered.

use std::collections::HashSet;
use std::sync::Arc;

use crate::distance::Metric;
use crate::error::{ForestError, Result};
use crate::forest::{ForestIndex, ForestParams, Node, NodeId, ProjectionTree, Split};
use crate::store::VectorStore;

/// Magic bytes identifying an index blob: "ANNFORST"
pub const MAGIC: [u8; 8] = *b"ANNFORST";

pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 40;

const CHECKSUM_SIZE: usize = 4;

const TAG_LEAF: u8 = 0;
const TAG_INTERNAL: u8 = 1;

/// Parsed fixed-size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub dimension: u32,
    pub count: u32,
    pub tree_count: u32,
    pub leaf_capacity: u32,
    pub metric: Metric,
    pub seed: u64,
}

impl IndexHeader {
    fn for_index(index: &ForestIndex) -> Self {
        let params = index.params();
        Self {
            version: FORMAT_VERSION,
            dimension: index.dimension() as u32,
            count: index.len() as u32,
            tree_count: index.trees().len() as u32,
            // ForestParams::validate keeps this within u32.
            leaf_capacity: params.leaf_capacity as u32,
            metric: index.metric(),
            seed: params.seed,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.dimension.to_le_bytes());
        buf[16..20].copy_from_slice(&self.count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.tree_count.to_le_bytes());
        buf[24..28].copy_from_slice(&self.leaf_capacity.to_le_bytes());
        buf[28] = self.metric.id();
        buf[32..40].copy_from_slice(&self.seed.to_le_bytes());
        buf
    }

    /// Parse and validate the header at the start of `bytes`.
    ///
    /// Does not verify the checksum; [`decode`] does that before trusting
    /// anything past the header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        if reader.take(8)? != MAGIC {
            return Err(ForestError::corrupt("bad magic bytes"));
        }
        let version = reader.u32()?;
        if version != FORMAT_VERSION {
            return Err(ForestError::UnsupportedFormatVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let dimension = reader.u32()?;
        let count = reader.u32()?;
        let tree_count = reader.u32()?;
        let leaf_capacity = reader.u32()?;
        let metric_id = reader.take(4)?[0];
        let seed = reader.u64()?;

        let metric = Metric::from_id(metric_id)
            .ok_or_else(|| ForestError::corrupt(format!("unknown metric id {}", metric_id)))?;
        if dimension == 0 {
            return Err(ForestError::corrupt("dimension is zero"));
        }
        if count == 0 {
            return Err(ForestError::corrupt("index holds no vectors"));
        }
        if tree_count == 0 {
            return Err(ForestError::corrupt("index holds no trees"));
        }
        if leaf_capacity == 0 {
            return Err(ForestError::corrupt("leaf capacity is zero"));
        }

        Ok(Self {
            version,
            dimension,
            count,
            tree_count,
            leaf_capacity,
            metric,
            seed,
        })
    }
}

/// Serialize an index to a single blob.
pub fn encode(index: &ForestIndex) -> Vec<u8> {
    let store = index.store();
    let header = IndexHeader::for_index(index);

    let mut out = Vec::with_capacity(HEADER_SIZE + store.raw_data().len() * 4);
    out.extend_from_slice(&header.to_bytes());

    for &x in store.raw_data() {
        out.extend_from_slice(&x.to_le_bytes());
    }

    for id in store.identifiers() {
        // VectorStore rejects ids longer than u32::MAX bytes.
        out.extend_from_slice(&(id.len() as u32).to_le_bytes());
        out.extend_from_slice(id.as_bytes());
    }

    for tree in index.trees() {
        out.extend_from_slice(&(tree.len() as u32).to_le_bytes());
        for node in tree.nodes() {
            encode_node(&mut out, node);
        }
    }

    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn encode_node(out: &mut Vec<u8>, node: &Node) {
    match node {
        Node::Leaf { slots } => {
            out.push(TAG_LEAF);
            out.extend_from_slice(&(slots.len() as u32).to_le_bytes());
            for slot in slots {
                out.extend_from_slice(&slot.to_le_bytes());
            }
        }
        Node::Internal { split, left, right } => {
            out.push(TAG_INTERNAL);
            for &x in &split.normal {
                out.extend_from_slice(&x.to_le_bytes());
            }
            out.extend_from_slice(&split.offset.to_le_bytes());
            out.extend_from_slice(&left.to_le_bytes());
            out.extend_from_slice(&right.to_le_bytes());
        }
    }
}

/// Deserialize a blob produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<ForestIndex> {
    if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(ForestError::corrupt(format!(
            "blob is {} bytes, smaller than header and checksum",
            bytes.len()
        )));
    }
    let header = IndexHeader::from_bytes(bytes)?;

    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(body);
    if actual != expected {
        return Err(ForestError::corrupt(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            expected, actual
        )));
    }

    let dimension = header.dimension as usize;
    let count = header.count as usize;

    let mut reader = ByteReader::new(&body[HEADER_SIZE..]);

    let floats = count
        .checked_mul(dimension)
        .ok_or_else(|| ForestError::corrupt("vector table size overflows"))?;
    let data = reader.f32_vec(floats)?;

    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.u32()? as usize;
        let raw = reader.take(len)?;
        let id = std::str::from_utf8(raw)
            .map_err(|_| ForestError::corrupt("item id is not valid UTF-8"))?;
        ids.push(id.to_string());
    }

    let store = VectorStore::from_parts(header.metric, dimension, data, ids)?;

    let mut trees = Vec::with_capacity(header.tree_count as usize);
    for ordinal in 0..header.tree_count {
        let tree = decode_tree(&mut reader, dimension, &header)
            .map_err(|e| ForestError::corrupt(format!("tree {}: {}", ordinal, e)))?;
        trees.push(tree);
    }

    if !reader.is_empty() {
        return Err(ForestError::corrupt(format!(
            "{} trailing bytes after last tree",
            reader.remaining()
        )));
    }

    let params = ForestParams {
        tree_count: header.tree_count as usize,
        leaf_capacity: header.leaf_capacity as usize,
        seed: header.seed,
        metric: header.metric,
    };
    Ok(ForestIndex::from_parts(Arc::new(store), trees, params))
}

/// Smallest encoded node: a tag plus an empty leaf's slot count.
const MIN_NODE_SIZE: usize = 5;

/// Decode one node table and check it forms a strict binary tree rooted at
/// node 0 whose leaves partition every slot.
fn decode_tree(
    reader: &mut ByteReader<'_>,
    dimension: usize,
    header: &IndexHeader,
) -> Result<ProjectionTree> {
    let count = header.count;
    let node_count = reader.u32()?;
    if node_count == 0 {
        return Err(ForestError::corrupt("tree has no nodes"));
    }
    if node_count as usize > reader.remaining() / MIN_NODE_SIZE {
        return Err(ForestError::corrupt(format!(
            "{} nodes cannot fit in {} bytes",
            node_count,
            reader.remaining()
        )));
    }

    let mut nodes = Vec::with_capacity(node_count as usize);
    let mut referenced = vec![false; node_count as usize];
    let mut seen_slots = HashSet::new();
    for id in 0..node_count {
        let node = match reader.u8()? {
            TAG_LEAF => {
                let len = reader.u32()? as usize;
                if len > header.leaf_capacity as usize {
                    return Err(ForestError::corrupt(format!(
                        "leaf {} holds {} slots, capacity is {}",
                        id, len, header.leaf_capacity
                    )));
                }
                let mut slots = Vec::with_capacity(len.min(reader.remaining() / 4));
                for _ in 0..len {
                    let slot = reader.u32()?;
                    if slot >= count {
                        return Err(ForestError::corrupt(format!(
                            "slot {} out of range (count={})",
                            slot, count
                        )));
                    }
                    if !seen_slots.insert(slot) {
                        return Err(ForestError::corrupt(format!("slot {} appears twice", slot)));
                    }
                    slots.push(slot);
                }
                Node::Leaf { slots }
            }
            TAG_INTERNAL => {
                let normal = reader.f32_vec(dimension)?;
                let offset = reader.f32()?;
                let left = reader.u32()?;
                let right = reader.u32()?;
                check_child(id, left, node_count)?;
                check_child(id, right, node_count)?;
                if left == right {
                    return Err(ForestError::corrupt(format!(
                        "node {} has the same child twice",
                        id
                    )));
                }
                for child in [left, right] {
                    if std::mem::replace(&mut referenced[child as usize], true) {
                        return Err(ForestError::corrupt(format!(
                            "node {} has more than one parent",
                            child
                        )));
                    }
                }
                Node::Internal {
                    split: Split { normal, offset },
                    left,
                    right,
                }
            }
            tag => {
                return Err(ForestError::corrupt(format!(
                    "unknown node tag {} at node {}",
                    tag, id
                )))
            }
        };
        nodes.push(node);
    }

    // Every parent precedes its children, so once each non-root node has
    // exactly one parent the whole table is reachable from the root.
    if let Some(orphan) = referenced.iter().skip(1).position(|&r| !r) {
        return Err(ForestError::corrupt(format!(
            "node {} is unreachable from the root",
            orphan + 1
        )));
    }
    if seen_slots.len() != count as usize {
        return Err(ForestError::corrupt(format!(
            "leaves cover {} of {} slots",
            seen_slots.len(),
            count
        )));
    }

    Ok(ProjectionTree::from_nodes(nodes))
}

/// Children must come after their parent, which rules out cycles.
fn check_child(parent: NodeId, child: NodeId, node_count: u32) -> Result<()> {
    if child <= parent || child >= node_count {
        return Err(ForestError::corrupt(format!(
            "node {} has child offset {} outside ({}, {})",
            parent, child, parent, node_count
        )));
    }
    Ok(())
}

/// Bounds-checked little-endian cursor over a byte slice.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ForestError::corrupt(format!(
                "truncated: wanted {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f32_vec(&mut self, n: usize) -> Result<Vec<f32>> {
        let len = n
            .checked_mul(4)
            .ok_or_else(|| ForestError::corrupt("float table size overflows"))?;
        let raw = self.take(len)?;
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{Query, SearchParams};
    use crate::vector::Vector;

    fn sample_index() -> ForestIndex {
        let vectors = (0..60).map(|i| {
            let f = i as f32 * 0.37;
            (
                format!("item-{}", i),
                Vector::new(vec![f.cos() + 2.0, f.sin(), (f * 1.7).cos()]),
            )
        });
        ForestIndex::build(vectors, ForestParams::new(3, 4, 77)).unwrap()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = IndexHeader {
            version: FORMAT_VERSION,
            dimension: 128,
            count: 1000,
            tree_count: 10,
            leaf_capacity: 32,
            metric: Metric::Euclidean,
            seed: 0xDEAD_BEEF,
        };
        let parsed = IndexHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_decode_restores_structure() {
        let index = sample_index();
        let restored = decode(&encode(&index)).unwrap();

        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.trees(), index.trees());
        assert_eq!(restored.params(), index.params());
        assert_eq!(restored.store().raw_data(), index.store().raw_data());
        assert_eq!(restored.store().slot_of("item-42"), Some(42));
    }

    #[test]
    fn test_decoded_index_answers_identically() {
        let index = sample_index();
        let restored = decode(&encode(&index)).unwrap();
        let params = SearchParams::default();
        for id in ["item-0", "item-17", "item-59"] {
            assert_eq!(
                index.query(Query::Item(id), 5, &params).unwrap(),
                restored.query(Query::Item(id), 5, &params).unwrap()
            );
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&sample_index());
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(ForestError::CorruptIndex(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(&sample_index());
        bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(ForestError::UnsupportedFormatVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = encode(&sample_index());
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x5A;
        assert!(matches!(decode(&bytes), Err(ForestError::CorruptIndex(_))));
    }

    #[test]
    fn test_truncated_blob() {
        let bytes = encode(&sample_index());
        for len in [0, 10, HEADER_SIZE, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..len]), Err(ForestError::CorruptIndex(_))),
                "length {} should be rejected",
                len
            );
        }
    }

    /// Re-seal a tampered body so only structural validation can catch it.
    fn reseal(mut body: Vec<u8>) -> Vec<u8> {
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn test_out_of_range_child_offset() {
        let index = sample_index();
        let bytes = encode(&index);
        let mut body = bytes[..bytes.len() - CHECKSUM_SIZE].to_vec();

        // The first node of the first tree is an internal root; its right
        // child offset sits just before the second node.
        let tree_start = HEADER_SIZE
            + index.len() * index.dimension() * 4
            + index.store().identifiers().map(|id| 4 + id.len()).sum::<usize>();
        assert_eq!(body[tree_start + 4], TAG_INTERNAL);
        let right_at = tree_start + 4 + 1 + (index.dimension() + 1) * 4 + 4;
        body[right_at..right_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = decode(&reseal(body)).unwrap_err();
        assert!(matches!(err, ForestError::CorruptIndex(msg) if msg.contains("child offset")));
    }

    /// One-dimensional euclidean blob with slot `i` at `[i]` and a single
    /// hand-written node table.
    fn single_tree_blob(count: u32, leaf_capacity: u32, nodes: &[Vec<u8>]) -> Vec<u8> {
        let header = IndexHeader {
            version: FORMAT_VERSION,
            dimension: 1,
            count,
            tree_count: 1,
            leaf_capacity,
            metric: Metric::Euclidean,
            seed: 0,
        };
        let mut body = header.to_bytes().to_vec();
        for i in 0..count {
            body.extend_from_slice(&(i as f32).to_le_bytes());
        }
        for i in 0..count {
            let id = format!("s{}", i);
            body.extend_from_slice(&(id.len() as u32).to_le_bytes());
            body.extend_from_slice(id.as_bytes());
        }
        body.extend_from_slice(&(nodes.len() as u32).to_le_bytes());
        for node in nodes {
            body.extend_from_slice(node);
        }
        reseal(body)
    }

    fn leaf(slots: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_node(&mut out, &Node::Leaf { slots: slots.to_vec() });
        out
    }

    fn internal(left: NodeId, right: NodeId) -> Vec<u8> {
        let mut out = Vec::new();
        let split = Split {
            normal: vec![1.0],
            offset: -0.5,
        };
        encode_node(&mut out, &Node::Internal { split, left, right });
        out
    }

    fn corrupt_reason(bytes: &[u8]) -> String {
        match decode(bytes) {
            Err(ForestError::CorruptIndex(msg)) => msg,
            other => panic!("expected CorruptIndex, got {:?}", other.map(|i| i.len())),
        }
    }

    #[test]
    fn test_hand_built_tree_decodes() {
        let blob = single_tree_blob(2, 1, &[internal(1, 2), leaf(&[0]), leaf(&[1])]);
        let index = decode(&blob).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.trees()[0].len(), 3);
    }

    #[test]
    fn test_node_with_two_parents_rejected() {
        let blob = single_tree_blob(
            2,
            2,
            &[internal(1, 2), internal(2, 3), leaf(&[0]), leaf(&[1])],
        );
        assert!(corrupt_reason(&blob).contains("more than one parent"));
    }

    #[test]
    fn test_unreachable_node_rejected() {
        let blob = single_tree_blob(2, 1, &[internal(1, 2), leaf(&[0]), leaf(&[1]), leaf(&[])]);
        assert!(corrupt_reason(&blob).contains("unreachable"));
    }

    #[test]
    fn test_missing_slot_rejected() {
        let blob = single_tree_blob(3, 2, &[internal(1, 2), leaf(&[0]), leaf(&[1])]);
        assert!(corrupt_reason(&blob).contains("cover 2 of 3"));
    }

    #[test]
    fn test_oversized_leaf_rejected() {
        let blob = single_tree_blob(3, 2, &[leaf(&[0, 1, 2])]);
        assert!(corrupt_reason(&blob).contains("capacity is 2"));
    }

    #[test]
    fn test_zero_leaf_capacity_rejected() {
        let blob = single_tree_blob(1, 0, &[leaf(&[0])]);
        assert!(corrupt_reason(&blob).contains("leaf capacity is zero"));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = encode(&sample_index());
        let mut body = bytes[..bytes.len() - CHECKSUM_SIZE].to_vec();
        body.push(0);
        assert!(matches!(
            decode(&reseal(body)),
            Err(ForestError::CorruptIndex(_))
        ));
    }
}
