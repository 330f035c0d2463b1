//! # NeuroEvolution - The Population Engine
//!
//! Holds a population of `(fitness, Graph)` pairs and runs generations of
//! evaluate, sort, recombine, replace. Selection is rank-weighted over
//! the top half; offspring overwrite the weakest half. After each epoch
//! batch the search space grows (hidden and link capacity double) once
//! the best individual uses more than half of its DNA capacity.
//!
//! Fitness is NaN until an individual has been evaluated. All ordering
//! decisions - sorting, the master accept rule, the worker pull/push
//! policy - use [`fitness_cmp`], a total order in which NaN sits below
//! every real value.

use std::cmp::Ordering;

use crate::graph::Graph;
use crate::rng::Rng;
use crate::MUTATION_PROB;

/// Total order on fitness values: NaN is below any real value.
///
/// Platform NaN comparisons are not well-ordered; every accept/seed
/// decision in the system goes through this instead.
pub fn fitness_cmp(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Task adapter contract: evaluate (and train) one graph for one episode,
/// returning its fitness.
pub trait Episode {
    fn episode(&mut self, graph: &mut Graph) -> f32;
}

/// The worker-facing surface of an evolution instance.
///
/// This is the contract a task implementation exposes to the distributed
/// coordinator; `NeuroEvolution` implements it for any `Episode`.
pub trait Evolution: Send {
    /// One evolutionary batch of `epoch` generations
    fn run(&mut self);
    /// Install foreign DNA over the weakest individual
    fn seed(&mut self, dna: &[u8]);
    /// DNA of the best individual
    fn best(&mut self) -> Vec<u8>;
    /// Fitness of the best individual (NaN before first evaluation)
    fn fitness(&self) -> f32;
    /// Fitness threshold at which the search is done
    fn objective(&self) -> f32;
}

/// Population engine over a task adapter.
pub struct NeuroEvolution<T: Episode> {
    rng: Rng,
    epoch: u32,
    objective: f32,
    population: Vec<(f32, Graph)>,
    task: T,
}

impl<T: Episode> NeuroEvolution<T> {
    /// Create a population of `size` random graphs (clamped to an even
    /// count of at least 4) with unset fitness.
    pub fn new(task: T, input: u32, output: u32, max_hidden: u32, max_links: u32, size: usize) -> Self {
        let size = size.max(4) / 2 * 2;
        let population = (0..size)
            .map(|_| (f32::NAN, Graph::new(input, output, max_hidden, max_links)))
            .collect();
        Self {
            rng: Rng::new(),
            epoch: 1000,
            objective: 0.0,
            population,
            task,
        }
    }

    /// Number of generations per `run` call
    pub fn set_epoch(&mut self, epoch: u32) {
        self.epoch = epoch;
    }

    /// Fitness threshold at which workers stop
    pub fn set_objective(&mut self, objective: f32) {
        self.objective = objective;
    }

    /// The population, sorted by fitness descending after `run`
    pub fn population(&self) -> &[(f32, Graph)] {
        &self.population
    }

    /// Run one epoch batch of generations, then apply the growth rule.
    pub fn run(&mut self) {
        let size = self.population.len();
        let half = size / 2;
        // rank weights over the top half: strongest rank draws most pairs
        let weights: Vec<f32> = (0..half).map(|k| (half - k) as f32).collect();

        for _ in 0..self.epoch {
            let Self { task, population, .. } = self;
            for (fitness, graph) in population.iter_mut() {
                *fitness = task.episode(graph);
            }

            self.population.sort_by(|a, b| fitness_cmp(b.0, a.0));

            let mut offspring = Vec::with_capacity(half);
            for _ in 0..half {
                let m = self.rng.discrete_choice(&weights);
                let f = self.rng.discrete_choice(&weights);
                let (male, female) = pair_mut(&mut self.population, 2 * m, 2 * f + 1);
                offspring.push(male.crossover(female, MUTATION_PROB));
            }

            for (i, child) in offspring.into_iter().enumerate() {
                if let Some(child) = child {
                    self.population[size - 1 - i] = (f32::NAN, child);
                }
            }
        }

        // replacement leaves unevaluated offspring at the tail; keep the
        // population in rank order (NaN sits below every real fitness)
        self.population.sort_by(|a, b| fitness_cmp(b.0, a.0));

        // grow the search space once the champion crowds its genome
        let best = &self.population[0].1;
        let used = best.size() as f32 / best.capacity() as f32;
        if used > 0.5 {
            let mut meta = *self.population[0].1.meta();
            meta.hidden *= 2;
            meta.links *= 2;
            for (_, graph) in self.population.iter_mut() {
                graph.meta = meta;
            }
        }
    }

    /// Load foreign DNA over the weakest individual and reseed the
    /// selection stream so converged workers diverge again.
    pub fn seed(&mut self, dna: &[u8]) {
        if let Some((_, graph)) = self.population.last_mut() {
            let _ = graph.load(dna);
        }
        self.rng.reseed();
    }

    /// Saved DNA of the rank-0 individual
    pub fn best(&mut self) -> Vec<u8> {
        self.population[0].1.save().to_vec()
    }

    /// Fitness of the rank-0 individual
    pub fn fitness(&self) -> f32 {
        self.population[0].0
    }

    /// Configured objective threshold
    pub fn objective(&self) -> f32 {
        self.objective
    }
}

impl<T: Episode + Send> Evolution for NeuroEvolution<T> {
    fn run(&mut self) {
        NeuroEvolution::run(self)
    }

    fn seed(&mut self, dna: &[u8]) {
        NeuroEvolution::seed(self, dna)
    }

    fn best(&mut self) -> Vec<u8> {
        NeuroEvolution::best(self)
    }

    fn fitness(&self) -> f32 {
        NeuroEvolution::fitness(self)
    }

    fn objective(&self) -> f32 {
        NeuroEvolution::objective(self)
    }
}

/// Two distinct mutable individuals; `i` and `j` never collide because
/// males sit at even ranks and females at odd ranks.
fn pair_mut(population: &mut [(f32, Graph)], i: usize, j: usize) -> (&mut Graph, &mut Graph) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = population.split_at_mut(j);
        (&mut left[i].1, &mut right[0].1)
    } else {
        let (left, right) = population.split_at_mut(i);
        (&mut right[0].1, &mut left[j].1)
    }
}
