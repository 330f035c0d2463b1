//! # MAGPIE Node
//!
//! The process behind the `magpie` binary: a master that keeps the
//! globally best genome, or a worker that evolves local populations and
//! synchronizes with the master. Exposed as a library so the
//! integration suite can run a real master on an ephemeral port.

pub mod master;
pub mod storage;
pub mod worker;
