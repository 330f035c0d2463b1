//! # MAGPIE Core
//!
//! Core types and engine for MAGPIE - distributed neuroevolution of
//! stochastic computation graphs.
//!
//! This crate provides the fundamental building blocks:
//! - **Node**: the unit of computation (input, additive, multiplicative)
//! - **Graph**: a population member; owns its nodes and its DNA buffer
//! - **DNA**: the fixed-layout byte serialization of a graph, used both
//!   for persistence and as the substrate of genetic operators
//! - **NeuroEvolution**: the population engine (evaluate, sort, recombine)
//! - **Protocol**: the master/worker wire schema and framing
//!
//! ## Design Philosophy
//!
//! Graphs are not designed. They are **evolved**.
//!
//! Nodes carry closed-form derivatives for REINFORCE updates; everything
//! structural (which nodes exist, how they connect) is decided by
//! crossover and mutation on the raw DNA bytes. The engine deliberately
//! tolerates mutation damage: malformed node or link slots are skipped on
//! load rather than rejected.
//!
//! ## Memory Layout
//!
//! DNA record types use `#[repr(C)]` for a predictable byte layout,
//! read and written through `bytemuck`. Integers in DNA are host-endian;
//! the same buffer is not portable between architectures of differing
//! endianness.

pub mod dna;
pub mod error;
pub mod evolution;
pub mod graph;
pub mod node;
pub mod protocol;
pub mod rng;

// Re-export main types at crate root
pub use dna::{LinkData, MetaData, NodeData, DTYPE_PRECISION};
pub use error::{MagpieError, MagpieResult};
pub use evolution::{fitness_cmp, Episode, Evolution, NeuroEvolution};
pub use graph::Graph;
pub use node::{sigmoid, Node, NodeKind};
pub use protocol::{Client, Request, Response};
pub use rng::Rng;

/// Reinforcement learning reward discount.
pub const GAMMA_DISCOUNT: f32 = 0.99;

/// Learning rate (lower is slower but more stable).
pub const LEARNING_RATE: f32 = 1e-2;

/// Mutation probability per DNA byte.
pub const MUTATION_PROB: f32 = 1e-3;

/// Finite-difference delta for numerical derivative checks.
pub const FINITE_DELTA: f32 = 1e-4;
