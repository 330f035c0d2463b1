//! # XOR Task
//!
//! The classic sanity objective for neuroevolution: two binary inputs,
//! two output ports (one per class), reward 1 when the sampled class
//! matches `a ^ b`. Small enough to converge in minutes, hard enough
//! that a linear graph cannot solve it.

use magpie_core::{Graph, NeuroEvolution, Rng};
use magpie_core::{Episode, GAMMA_DISCOUNT, LEARNING_RATE};

/// Truth table of the objective
const CASES: [(f32, f32, u32); 4] = [
    (0.0, 0.0, 0),
    (0.0, 1.0, 1),
    (1.0, 0.0, 1),
    (1.0, 1.0, 0),
];

/// Passes over the truth table per episode (batch size 4 * ROUNDS)
const ROUNDS: usize = 25;

/// XOR classification episode.
pub struct XorTask {
    rng: Rng,
    deck: Vec<usize>,
}

impl XorTask {
    pub fn new() -> Self {
        Self {
            rng: Rng::new(),
            deck: (0..CASES.len()).collect(),
        }
    }

    fn set_input(&self, graph: &mut Graph, a: f32, b: f32) {
        graph.set(0, a);
        graph.set(1, b);
    }

    /// Sample a class from the output port activations
    fn get_output(&mut self, graph: &mut Graph) -> u32 {
        let ports = graph.meta().output;
        let outputs: Vec<f32> = (0..ports).map(|i| graph.get(i)).collect();
        self.rng.discrete_choice(&outputs) as u32
    }

    /// Accuracy over the truth table without any parameter updates
    pub fn validate(&mut self, graph: &mut Graph) -> f32 {
        let mut total = 0.0;
        for _ in 0..ROUNDS {
            for &(a, b, label) in CASES.iter() {
                graph.reset();
                self.set_input(graph, a, b);
                if self.get_output(graph) == label {
                    total += 1.0;
                }
            }
        }
        total / (ROUNDS * CASES.len()) as f32
    }
}

impl Default for XorTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Episode for XorTask {
    fn episode(&mut self, graph: &mut Graph) -> f32 {
        let mut total = 0.0;
        let mut deck = std::mem::take(&mut self.deck);
        for _ in 0..ROUNDS {
            self.rng.shuffle(&mut deck);
            for &case in deck.iter() {
                let (a, b, label) = CASES[case];

                graph.reset();
                self.set_input(graph, a, b);
                let answer = self.get_output(graph);
                let reward = if answer == label { 1.0 } else { 0.0 };
                graph.reward(reward);
                graph.gradient(GAMMA_DISCOUNT);
                total += reward;
            }
        }
        self.deck = deck;
        graph.update(LEARNING_RATE);

        total / (ROUNDS * CASES.len()) as f32
    }
}

/// A ready-to-run evolution instance for the registry: 2 inputs, one
/// output port per class, room for 8 hidden nodes with 2 links each.
pub fn evolution() -> NeuroEvolution<XorTask> {
    let mut evo = NeuroEvolution::new(XorTask::new(), 2, 2, 8, 2, 50);
    evo.set_epoch(10);
    evo.set_objective(1.0 - 1e-5);
    evo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_fitness_in_unit_range() {
        let mut task = XorTask::new();
        let mut graph = Graph::new(2, 2, 8, 2);
        let fitness = task.episode(&mut graph);
        assert!((0.0..=1.0).contains(&fitness), "fitness {fitness}");
    }

    #[test]
    fn test_validate_leaves_parameters_unchanged() {
        let mut task = XorTask::new();
        let mut graph = Graph::new(2, 2, 8, 2);
        let before = graph.save().to_vec();

        task.validate(&mut graph);

        assert_eq!(graph.save(), &before[..]);
    }

    #[test]
    fn test_unconnected_graph_scores_near_chance() {
        let mut task = XorTask::new();
        let mut graph = Graph::new(2, 2, 8, 2);
        // a linkless graph guesses; over 100 samples it cannot be perfect
        let fitness = task.episode(&mut graph);
        assert!(fitness < 1.0);
    }

    #[test]
    fn test_evolution_configuration() {
        let evo = evolution();
        assert_eq!(evo.population().len(), 50);
        assert!(evo.fitness().is_nan());
        assert!((evo.objective() - (1.0 - 1e-5)).abs() < 1e-9);
    }
}
