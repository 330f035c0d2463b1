//! # MAGPIE Tasks
//!
//! Built-in task adapters and the registry workers use to instantiate
//! them. A task defines the episode: how samples are encoded onto a
//! graph's input ports, how an action is decoded from its output ports,
//! and what reward that action earns.
//!
//! The worker CLI names an implementation (`magpie worker <HOST> <PORT>
//! <IMPL>`); [`create`] resolves that name to a ready-to-run evolution
//! instance, one per worker thread.

pub mod xor;

use magpie_core::Evolution;

/// Instantiate a registered task implementation by name.
pub fn create(name: &str) -> Option<Box<dyn Evolution + Send>> {
    match name {
        "xor" => Some(Box::new(xor::evolution())),
        _ => None,
    }
}

/// Names accepted by [`create`]
pub fn available() -> &'static [&'static str] {
    &["xor"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_known_names() {
        for name in available() {
            assert!(create(name).is_some(), "{name} should resolve");
        }
    }

    #[test]
    fn test_registry_rejects_unknown_names() {
        assert!(create("no-such-task").is_none());
    }

    #[test]
    fn test_created_instance_is_runnable() {
        let mut evo = create("xor").unwrap();
        assert!(evo.fitness().is_nan());
        assert!(evo.objective() > 0.99);
        let dna = evo.best();
        assert!(dna.len() > 16);
    }
}
