//! # Graph - An Evolvable Stochastic Computation Graph
//!
//! A graph owns its nodes in a flat arena; links store live indices into
//! that arena, so traversal and gradient passes never chase pointers.
//! Alongside the arena the graph keeps its DNA buffer and the bookkeeping
//! needed to place each live node and link back into the fixed DNA
//! layout: `nodes_index` maps live index to store index, `links_index`
//! maps each live link to its slot.
//!
//! Forward evaluation is lazy and memoized. The history entry is pushed
//! and the cache flag set *before* the state is computed, so a cyclic
//! graph (mutation can produce one) terminates: an in-progress node reads
//! as its zeroed placeholder.
//!
//! `load` is deliberately tolerant: node slots with type 0 or an
//! out-of-range code are skipped, as are links whose source slot is not
//! live. Mutation damage degrades a genome instead of invalidating it.

use std::collections::HashMap;

use crate::dna::{
    self, dna_len, link_offset, node_offset, read_meta, read_record, write_record, LinkData,
    MetaData, NodeData, META_SIZE, NODE_MAXIMUM,
};
use crate::node::{discounted_returns, sigmoid, Node, NodeKind};
use crate::rng::Rng;
use crate::FINITE_DELTA;

/// Evolvable computation graph: node arena + DNA buffer + store indices.
pub struct Graph {
    pub(crate) meta: MetaData,
    pub(crate) nodes: Vec<Node>,
    /// Store index of each live node
    pub(crate) nodes_index: Vec<u32>,
    /// Active link slots of each live node, parallel to its inputs
    pub(crate) links_index: Vec<Vec<u32>>,
    pub(crate) dna: Vec<u8>,
    pub(crate) rng: Rng,
}

impl Graph {
    /// Create a graph with `input` input ports and `output` output nodes
    /// of uniformly random operation type. No links exist yet;
    /// connectivity is acquired through `load` and `crossover`.
    pub fn new(input: u32, output: u32, max_hidden: u32, max_links: u32) -> Self {
        let mut graph = Self {
            meta: MetaData {
                input,
                output,
                hidden: max_hidden,
                links: max_links,
            },
            nodes: Vec::new(),
            nodes_index: Vec::new(),
            links_index: Vec::new(),
            dna: Vec::new(),
            rng: Rng::new(),
        };
        for i in 0..input {
            graph.nodes.push(Node::new(NodeKind::Input));
            graph.nodes_index.push(i);
            graph.links_index.push(Vec::new());
        }
        for i in 0..output {
            let kind = random_kind(&mut graph.rng);
            graph.nodes.push(Node::new(kind));
            graph.nodes_index.push(input + i);
            graph.links_index.push(Vec::new());
        }
        graph
    }

    /// Graph dimensions
    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    /// Number of live connections
    pub fn size(&self) -> u32 {
        self.nodes.iter().map(|n| n.in_degree() as u32).sum()
    }

    /// Maximum number of connections the DNA layout can represent
    pub fn capacity(&self) -> u32 {
        (self.meta.hidden + self.meta.output) * self.meta.links
    }

    /// Write a value to input port `port`
    pub fn set(&mut self, port: u32, value: f32) {
        let node = &mut self.nodes[port as usize];
        node.cache = false;
        node.value = value;
    }

    /// Read the current output of output port `port`
    pub fn get(&mut self, port: u32) -> f32 {
        self.eval((self.meta.input + port) as usize)
    }

    /// Clear caches and histories on every node (gradients survive)
    pub fn reset(&mut self) {
        self.nodes.iter_mut().for_each(Node::reset);
    }

    /// Clear only the caches; histories keep growing
    pub fn recache(&mut self) {
        self.nodes.iter_mut().for_each(Node::recache);
    }

    /// Record a reward on every reachable node
    pub fn reward(&mut self, reward: f32) {
        self.nodes.iter_mut().for_each(|n| n.reward(reward));
    }

    /// Accumulate REINFORCE gradients over the recorded reward range
    pub fn gradient(&mut self, gamma: f32) {
        for idx in 0..self.nodes.len() {
            let rsize = self.nodes[idx].reward.len();
            if rsize == 0 {
                continue;
            }
            let returns = discounted_returns(&self.nodes[idx].reward, gamma);

            let isize = self.nodes[idx].in_degree();
            let mut dw = vec![0.0f32; isize];
            let mut db = 0.0f32;
            for t in 0..rsize {
                let g = self.nodes[idx].dlds(returns[t], t);
                for (i, dwi) in dw.iter_mut().enumerate() {
                    *dwi += g * self.dsdw(idx, i, t);
                }
                db += g * self.dsdb(idx, t);
            }

            let node = &mut self.nodes[idx];
            for (acc, d) in node.wgrad.iter_mut().zip(dw.iter()) {
                *acc += d;
            }
            node.bgrad += db;
        }
    }

    /// Apply and zero the accumulated gradients on every node
    pub fn update(&mut self, lr: f32) {
        self.nodes.iter_mut().for_each(|n| n.update(lr));
    }

    /// State at recorded time `t`, from the stored histories
    pub fn state_at(&self, idx: usize, t: usize) -> f32 {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Input => node.state.get(t).copied().unwrap_or(node.value),
            NodeKind::Add => {
                let mut s = node.bias;
                for (&src, &w) in node.inputs.iter().zip(node.weights.iter()) {
                    s += w * self.output_at(src, t);
                }
                s
            }
            NodeKind::Mul => {
                let mut s = node.bias;
                for (&src, &w) in node.inputs.iter().zip(node.weights.iter()) {
                    s *= w + self.output_at(src, t);
                }
                s
            }
        }
    }

    /// State derivative w.r.t. the `i`-th weight at recorded time `t`
    pub fn dsdw(&self, idx: usize, i: usize, t: usize) -> f32 {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Input => 0.0,
            NodeKind::Add => self.output_at(node.inputs[i], t),
            NodeKind::Mul => {
                let mut s = node.bias;
                for (j, (&src, &w)) in node.inputs.iter().zip(node.weights.iter()).enumerate() {
                    if j == i {
                        continue;
                    }
                    s *= self.output_at(src, t) + w;
                }
                s
            }
        }
    }

    /// State derivative w.r.t. the bias at recorded time `t`
    pub fn dsdb(&self, idx: usize, t: usize) -> f32 {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Input => 0.0,
            NodeKind::Add => 1.0,
            NodeKind::Mul => {
                let mut s = 1.0;
                for (&src, &w) in node.inputs.iter().zip(node.weights.iter()) {
                    s *= self.output_at(src, t) + w;
                }
                s
            }
        }
    }

    /// Central-difference check of `dsdw`
    pub fn dsdw_numeric(&mut self, idx: usize, i: usize, t: usize) -> f32 {
        let w = self.nodes[idx].weights[i];
        self.nodes[idx].weights[i] = w - FINITE_DELTA;
        let s1 = self.state_at(idx, t);
        self.nodes[idx].weights[i] = w + FINITE_DELTA;
        let s2 = self.state_at(idx, t);
        self.nodes[idx].weights[i] = w;
        (s2 - s1) / FINITE_DELTA / 2.0
    }

    /// Central-difference check of `dsdb`
    pub fn dsdb_numeric(&mut self, idx: usize, t: usize) -> f32 {
        let b = self.nodes[idx].bias;
        self.nodes[idx].bias = b - FINITE_DELTA;
        let s1 = self.state_at(idx, t);
        self.nodes[idx].bias = b + FINITE_DELTA;
        let s2 = self.state_at(idx, t);
        self.nodes[idx].bias = b;
        (s2 - s1) / FINITE_DELTA / 2.0
    }

    /// Serialize into the internal DNA buffer and return it.
    ///
    /// The buffer is resized to the capacity implied by the current meta;
    /// slots without a live counterpart keep whatever bytes they had and
    /// are ignored on reload by the type check.
    pub fn save(&mut self) -> &[u8] {
        let size = dna_len(&self.meta);
        if self.dna.len() != size {
            self.dna.resize(size, 0);
        }
        write_record(&mut self.dna, 0, &self.meta);

        for live in self.meta.input as usize..self.nodes.len() {
            let node = &self.nodes[live];
            let record = NodeData {
                kind: node.kind.code(),
                bias: dna::to_fixed(node.bias) as u32,
            };
            write_record(&mut self.dna, node_offset(&self.meta, self.nodes_index[live]), &record);
        }

        for live in self.meta.input as usize..self.nodes.len() {
            for (j, &slot) in self.links_index[live].iter().enumerate() {
                let node = &self.nodes[live];
                let record = LinkData {
                    source: self.nodes_index[node.inputs[j]],
                    weight: dna::to_fixed(node.weights[j]) as u32,
                };
                write_record(
                    &mut self.dna,
                    link_offset(&self.meta, self.nodes_index[live], slot),
                    &record,
                );
            }
        }

        &self.dna
    }

    /// Rebuild this graph from a DNA buffer.
    ///
    /// Returns false when the buffer is too small for its own header or
    /// link region, or when the rebuilt graph fails `is_valid`. Malformed
    /// node and link slots are skipped silently.
    pub fn load(&mut self, dna: &[u8]) -> bool {
        self.clear();

        if dna.len() < META_SIZE {
            return false;
        }
        let meta = read_meta(dna);
        let max_nodes = meta.input + meta.output + meta.hidden;
        if dna.len() < link_offset(&meta, max_nodes, 0) {
            return false;
        }
        self.dna = dna.to_vec();

        // store index to live index; inputs are virtual slots
        let mut node_map: HashMap<u32, usize> = HashMap::new();
        for i in 0..meta.input {
            node_map.insert(i, self.nodes.len());
            self.nodes_index.push(i);
            self.links_index.push(Vec::new());
            self.nodes.push(Node::new(NodeKind::Input));
        }

        for i in meta.input..max_nodes {
            let record: NodeData = read_record(dna, node_offset(&meta, i));
            let kind = match NodeKind::from_code(record.kind % (NODE_MAXIMUM + 1)) {
                Some(kind) => kind,
                None => continue, // inactive slot
            };
            let mut node = Node::new(kind);
            node.bias = dna::to_float(record.bias as i32);
            node_map.insert(i, self.nodes.len());
            self.nodes_index.push(i);
            self.links_index.push(Vec::new());
            self.nodes.push(node);
        }

        for i in meta.input..max_nodes {
            let target = match node_map.get(&i) {
                Some(&t) => t,
                None => continue,
            };
            for j in 0..meta.links {
                let record: LinkData = read_record(dna, link_offset(&meta, i, j));
                let source = match node_map.get(&(record.source % (max_nodes + 1))) {
                    Some(&s) => s,
                    None => continue, // inactive or out-of-range source
                };
                self.nodes[target].add_input(source, dna::to_float(record.weight as i32));
                self.links_index[target].push(j);
            }
        }

        // capacity only ever grows over a graph's lifetime
        self.meta.input = self.meta.input.max(meta.input);
        self.meta.output = self.meta.output.max(meta.output);
        self.meta.hidden = self.meta.hidden.max(meta.hidden);
        self.meta.links = self.meta.links.max(meta.links);

        self.is_valid()
    }

    /// Structural validity: enough nodes, inputs first, inputs only first
    pub fn is_valid(&self) -> bool {
        if self.nodes.len() < (self.meta.input + self.meta.output) as usize {
            return false;
        }
        for node in &self.nodes[..self.meta.input as usize] {
            if node.kind != NodeKind::Input {
                return false;
            }
        }
        for node in &self.nodes[self.meta.input as usize..] {
            if node.kind == NodeKind::Input {
                return false;
            }
        }
        true
    }

    /// One-point crossover with a bit-level mix at the split byte,
    /// followed by bytewise mutation. Returns None when the parents'
    /// DNA lengths differ or the child fails to load.
    pub fn crossover(&mut self, other: &mut Graph, mut_prob: f32) -> Option<Graph> {
        let a = self.save().to_vec();
        let b = other.save().to_vec();

        if a.len() != b.len() || a.len() <= META_SIZE {
            return None;
        }

        // fair coin for which parent contributes the prefix
        let (pa, pb) = if self.rng.uniform_int(1) == 1 {
            (&a, &b)
        } else {
            (&b, &a)
        };

        let index = self
            .rng
            .uniform_int_range(META_SIZE as u32, (a.len() - 1) as u32) as usize;
        let mut child = Vec::with_capacity(a.len());
        child.extend_from_slice(&pa[..index]);
        child.extend_from_slice(&pb[index..]);

        // split byte: high 8-bits bits from the prefix parent, low bits
        // bits from the suffix parent
        let bits = self.rng.uniform_int(8);
        let high = (pa[index] as u32 >> bits) << bits;
        let low = ((pb[index] as u32) << (8 - bits) & 0xff) >> (8 - bits);
        child[index] = (high | low) as u8;

        // independent single-bit flips over the non-header region
        for byte in child[META_SIZE..].iter_mut() {
            if self.rng.uniform_dec(1.0) < mut_prob {
                *byte ^= 1 << self.rng.uniform_int(7);
            }
        }

        let mut offspring = Graph::new(0, 0, 0, 0);
        if offspring.load(&child) {
            Some(offspring)
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.nodes_index.clear();
        self.links_index.clear();
    }

    /// Lazily memoized forward output of the node at `idx`.
    ///
    /// The placeholder entries are pushed and the cache committed before
    /// the state is computed; cycles read the placeholder and terminate.
    fn eval(&mut self, idx: usize) -> f32 {
        if self.nodes[idx].cache {
            return self.nodes[idx].output.last().copied().unwrap_or(0.0);
        }

        self.nodes[idx].state.push(0.0);
        self.nodes[idx].output.push(0.0);
        self.nodes[idx].cache = true;

        let state = match self.nodes[idx].kind {
            NodeKind::Input => self.nodes[idx].value,
            NodeKind::Add => {
                let links: Vec<(usize, f32)> = self.nodes[idx]
                    .inputs
                    .iter()
                    .copied()
                    .zip(self.nodes[idx].weights.iter().copied())
                    .collect();
                let mut s = self.nodes[idx].bias;
                for (src, w) in links {
                    s += w * self.eval(src);
                }
                s
            }
            NodeKind::Mul => {
                let links: Vec<(usize, f32)> = self.nodes[idx]
                    .inputs
                    .iter()
                    .copied()
                    .zip(self.nodes[idx].weights.iter().copied())
                    .collect();
                let mut s = self.nodes[idx].bias;
                for (src, w) in links {
                    s *= w + self.eval(src);
                }
                s
            }
        };

        let output = match self.nodes[idx].kind {
            // input activation is the raw value, not a Bernoulli sample
            NodeKind::Input => self.nodes[idx].value,
            _ => {
                if sigmoid(state) > self.rng.uniform_dec(1.0) {
                    1.0
                } else {
                    0.0
                }
            }
        };

        let node = &mut self.nodes[idx];
        *node.state.last_mut().unwrap() = state;
        *node.output.last_mut().unwrap() = output;
        output
    }

    fn output_at(&self, idx: usize, t: usize) -> f32 {
        // out-of-range reads only happen on mutation-corrupted graphs
        self.nodes[idx].output.get(t).copied().unwrap_or(0.0)
    }
}

/// Uniformly random non-input node kind
fn random_kind(rng: &mut Rng) -> NodeKind {
    match rng.uniform_int_range(NodeKind::Add.code(), NodeKind::Mul.code()) {
        2 => NodeKind::Add,
        _ => NodeKind::Mul,
    }
}
