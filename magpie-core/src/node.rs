//! # Node - The Unit of Computation
//!
//! A node is one of three variants with distinct forward math but a
//! shared gradient interface:
//!
//! - **Input**: holds an externally set value; identity activation
//! - **Add**: `S = bias + Σ wᵢ·xᵢ`
//! - **Mul**: `S = bias · Π (wᵢ + xᵢ)`
//!
//! Non-input activations are Bernoulli samples of `σ(S)`; training is
//! REINFORCE over the recorded state/output/reward histories. The node
//! itself stores only its own data; anything that needs a sibling's
//! output (forward evaluation, state derivatives) lives on [`Graph`].
//!
//! [`Graph`]: crate::graph::Graph

/// Node variant tag. Codes match the on-DNA type field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Input = 1,
    Add = 2,
    Mul = 3,
}

impl NodeKind {
    /// The on-DNA type code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a type code; 0 and out-of-range codes are inactive slots
    pub fn from_code(code: u32) -> Option<NodeKind> {
        match code {
            1 => Some(NodeKind::Input),
            2 => Some(NodeKind::Add),
            3 => Some(NodeKind::Mul),
            _ => None,
        }
    }
}

/// Sigmoid activation
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One node of a graph.
///
/// `inputs` holds live indices into the owning graph's node arena,
/// parallel to `weights` and `wgrad`. The history vectors grow by one
/// entry per forward evaluation and are cleared by `reset`, never
/// shrunk elsewhere.
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<usize>,
    pub(crate) weights: Vec<f32>,
    pub(crate) wgrad: Vec<f32>,
    pub(crate) state: Vec<f32>,
    pub(crate) output: Vec<f32>,
    pub(crate) reward: Vec<f32>,
    pub(crate) bias: f32,
    pub(crate) bgrad: f32,
    pub(crate) cache: bool,
    /// Input nodes only: the last externally set value
    pub(crate) value: f32,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            weights: Vec::new(),
            wgrad: Vec::new(),
            state: Vec::new(),
            output: Vec::new(),
            reward: Vec::new(),
            bias: 1.0,
            bgrad: 0.0,
            cache: true,
            value: 0.0,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Current in-degree
    pub fn in_degree(&self) -> usize {
        self.inputs.len()
    }

    /// Create an input connection from the node at live index `source`
    pub fn add_input(&mut self, source: usize, weight: f32) {
        self.cache = false;
        self.inputs.push(source);
        self.weights.push(weight);
        self.wgrad.push(0.0);
    }

    /// Clear cache and histories, keeping the accumulated gradients
    pub fn reset(&mut self) {
        self.cache = false;
        self.state.clear();
        self.output.clear();
        self.reward.clear();
    }

    /// Clear only the cache flag; histories stay
    pub fn recache(&mut self) {
        self.cache = false;
    }

    /// Record a reward, but only on reachable nodes (those whose state
    /// history advanced since the last reward)
    pub fn reward(&mut self, reward: f32) {
        if self.state.len() > self.reward.len() {
            self.reward.push(reward);
        }
    }

    /// Apply accumulated gradients and zero them
    pub fn update(&mut self, lr: f32) {
        for (w, g) in self.weights.iter_mut().zip(self.wgrad.iter()) {
            *w -= lr * g;
        }
        self.bias -= lr * self.bgrad;
        self.wgrad.iter_mut().for_each(|g| *g = 0.0);
        self.bgrad = 0.0;
    }

    /// Loss derivative w.r.t. state at recorded time `t`.
    ///
    /// REINFORCE with observed action `a` and return `r`:
    /// `dL/dS = sign · r · σ(sign · S)` with `sign = 1 - 2a`.
    pub(crate) fn dlds(&self, reward: f32, t: usize) -> f32 {
        if self.kind == NodeKind::Input {
            return 0.0;
        }
        let state = self.state[t];
        let active = self.output[t];
        let sign = 1.0 - 2.0 * active;
        sign * reward * sigmoid(sign * state)
    }
}

/// Backward-discounted returns: `R_t = reward[t] + gamma * R_{t+1}`
pub(crate) fn discounted_returns(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut r = 0.0;
    for t in (0..rewards.len()).rev() {
        r = gamma * r + rewards[t];
        returns[t] = r;
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(NodeKind::Input.code(), 1);
        assert_eq!(NodeKind::Add.code(), 2);
        assert_eq!(NodeKind::Mul.code(), 3);
        assert_eq!(NodeKind::from_code(0), None);
        assert_eq!(NodeKind::from_code(2), Some(NodeKind::Add));
        assert_eq!(NodeKind::from_code(4), None);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_discount_identity() {
        let gamma = 0.99f32;
        let (r0, r1, r2) = (1.0f32, 0.0f32, 1.0f32);
        let returns = discounted_returns(&[r0, r1, r2], gamma);
        assert_eq!(returns[2], r2);
        assert_eq!(returns[1], r1 + gamma * r2);
        assert_eq!(returns[0], r0 + gamma * (r1 + gamma * r2));
    }

    #[test]
    fn test_reward_only_on_reachable() {
        let mut node = Node::new(NodeKind::Add);
        // no forward step yet: reward is dropped
        node.reward(1.0);
        assert!(node.reward.is_empty());

        node.state.push(0.0);
        node.output.push(0.0);
        node.reward(1.0);
        assert_eq!(node.reward.len(), 1);
        // second reward without a new step is dropped too
        node.reward(1.0);
        assert_eq!(node.reward.len(), 1);
    }

    #[test]
    fn test_update_zeroes_gradients() {
        let mut node = Node::new(NodeKind::Add);
        node.add_input(0, 2.0);
        node.wgrad[0] = 0.5;
        node.bgrad = 0.25;
        node.update(0.1);
        assert!((node.weights[0] - (2.0 - 0.1 * 0.5)).abs() < 1e-6);
        assert!((node.bias - (1.0 - 0.1 * 0.25)).abs() < 1e-6);
        assert_eq!(node.wgrad[0], 0.0);
        assert_eq!(node.bgrad, 0.0);
    }

    #[test]
    fn test_dlds_sign() {
        let mut node = Node::new(NodeKind::Add);
        node.state.push(0.0);
        node.output.push(1.0);
        // action 1, positive reward: push state up (negative dL/dS)
        assert!(node.dlds(1.0, 0) < 0.0);
        node.output[0] = 0.0;
        // action 0, positive reward: push state down
        assert!(node.dlds(1.0, 0) > 0.0);
    }

    #[test]
    fn test_input_dlds_zero() {
        let mut node = Node::new(NodeKind::Input);
        node.state.push(3.0);
        node.output.push(3.0);
        assert_eq!(node.dlds(1.0, 0), 0.0);
    }
}
