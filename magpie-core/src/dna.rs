//! # DNA - The Genetic Code of Graphs
//!
//! DNA is the fixed-layout byte serialization of a graph: its metadata,
//! node slots, and link slots. The same buffer is the unit of
//! persistence, the wire payload, and the substrate genetic operators
//! splice and flip.
//!
//! ## Structure
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ MetaData                     { input, output, hidden, links } │
//! │ NodeData × (output + hidden)           { type, bias (fixed) } │
//! │ LinkData × (output + hidden) × links { source, weight (fixed)}│
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Input nodes are not materialized; they occupy the virtual slot range
//! `[0, input)`. A node slot whose decoded type is 0 is inactive - this
//! deliberately conflates "never written" with "knocked out by mutation".
//!
//! Records are `#[repr(C)]` and `Pod`, so all integers are host-endian.

use bytemuck::{Pod, Zeroable};

/// Parameter compression level for fixed-point storage
pub const DTYPE_PRECISION: f32 = 1e-3;

/// Node type codes outside `[1, NODE_MAXIMUM]` mark a slot inactive
pub const NODE_MAXIMUM: u32 = 3;

/// Graph dimensions; the DNA header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct MetaData {
    /// Input port count
    pub input: u32,
    /// Output port count
    pub output: u32,
    /// Maximum hidden node capacity
    pub hidden: u32,
    /// Maximum in-degree per non-input node
    pub links: u32,
}

/// One node slot: type code and fixed-point bias
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct NodeData {
    pub kind: u32,
    pub bias: u32,
}

/// One link slot: source node store-index and fixed-point weight
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LinkData {
    pub source: u32,
    pub weight: u32,
}

/// Header size in bytes
pub const META_SIZE: usize = std::mem::size_of::<MetaData>();

/// Compress a float to fixed-point, saturating at the i32 range
pub fn to_fixed(f: f32) -> i32 {
    let v = (f / DTYPE_PRECISION).round();
    if v >= i32::MAX as f32 {
        i32::MAX
    } else if v <= i32::MIN as f32 {
        i32::MIN
    } else {
        v as i32
    }
}

/// Expand a fixed-point value back to a float
pub fn to_float(i: i32) -> f32 {
    i as f32 * DTYPE_PRECISION
}

/// Byte offset of node slot `node` (a store index; inputs are virtual)
pub fn node_offset(meta: &MetaData, node: u32) -> usize {
    META_SIZE + (node - meta.input) as usize * std::mem::size_of::<NodeData>()
}

/// Byte offset of link slot `link` of node slot `node`
pub fn link_offset(meta: &MetaData, node: u32, link: u32) -> usize {
    META_SIZE
        + (meta.output + meta.hidden) as usize * std::mem::size_of::<NodeData>()
        + ((node - meta.input) as usize * meta.links as usize + link as usize)
            * std::mem::size_of::<LinkData>()
}

/// Total buffer length implied by `meta`
pub fn dna_len(meta: &MetaData) -> usize {
    link_offset(meta, meta.input + meta.output + meta.hidden, 0)
}

/// Read the header from a DNA buffer (must hold at least `META_SIZE` bytes)
pub fn read_meta(dna: &[u8]) -> MetaData {
    bytemuck::pod_read_unaligned(&dna[..META_SIZE])
}

/// Read a `Pod` record at `offset`
pub fn read_record<T: Pod>(dna: &[u8], offset: usize) -> T {
    bytemuck::pod_read_unaligned(&dna[offset..offset + std::mem::size_of::<T>()])
}

/// Write a `Pod` record at `offset`
pub fn write_record<T: Pod>(dna: &mut [u8], offset: usize, record: &T) {
    dna[offset..offset + std::mem::size_of::<T>()].copy_from_slice(bytemuck::bytes_of(record));
}
