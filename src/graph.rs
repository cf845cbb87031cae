//! Arena records for the graph primitives.
//!
//! Nodes, arcs, and layers are rows in flat vectors owned by the
//! network; every cross-reference is an index. This keeps recurrent and
//! self-referencing wiring free of ownership cycles while traversal
//! stays O(1) per hop.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;

pub type NodeId = usize;
pub type ArcId = usize;
pub type LayerId = usize;
pub type LinkId = usize;

/// Declared I/O role of a layer, used to bind external vectors
/// positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    None,
    Input,
    Output,
    Encoder,
    Decoder,
}

impl Role {
    /// Layers whose nodes receive the external input vector.
    pub fn binds_input(self) -> bool {
        matches!(self, Role::Input | Role::Encoder)
    }

    /// Layers whose nodes make up the external output vector.
    pub fn binds_output(self) -> bool {
        matches!(self, Role::Output | Role::Decoder)
    }
}

/// A scalar activation unit.
///
/// Holds one round of activation history: writes through
/// [`Node::set_activation`] shift the current level into
/// `prev_activation` first, which is what makes simultaneous
/// intra-layer updates race-free.
#[derive(Debug, Clone)]
pub struct Node {
    pub layer: LayerId,
    activation: f32,
    prev_activation: f32,
    /// Pre-activation weighted input sum.
    pub potential: f32,
    /// Back-propagated error term; scratch between link passes.
    pub delta: f32,
    pub incoming: Vec<ArcId>,
    pub outgoing: Vec<ArcId>,
}

impl Node {
    pub fn new(layer: LayerId) -> Self {
        Self {
            layer,
            activation: 0.0,
            prev_activation: 0.0,
            potential: 0.0,
            delta: 0.0,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn activation(&self) -> f32 {
        self.activation
    }

    pub fn prev_activation(&self) -> f32 {
        self.prev_activation
    }

    /// Write an activation level, shifting the old value into history.
    pub fn set_activation(&mut self, value: f32) {
        self.prev_activation = self.activation;
        self.activation = value;
    }

    /// Zero both activation levels, the membrane potential, and the
    /// error term. Arc state is untouched.
    pub fn reset(&mut self) {
        self.activation = 0.0;
        self.prev_activation = 0.0;
        self.potential = 0.0;
        self.delta = 0.0;
    }
}

/// A directed weighted edge between two nodes.
#[derive(Debug, Clone)]
pub struct Arc {
    pub pre: NodeId,
    pub post: NodeId,
    pub weight: f32,
    /// Kept so a network reset can restore the starting weight.
    pub init_weight: f32,
    pub link: LinkId,
}

impl Arc {
    /// Return the weight to its initial value; connectivity untouched.
    pub fn reset(&mut self) {
        self.weight = self.init_weight;
    }
}

/// An ordered group of nodes sharing one activation function and
/// update policy. Node order is fixed at construction and binds
/// external vectors positionally.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub nodes: Vec<NodeId>,
    pub activation: Activation,
    pub role: Role,
    /// Links for which this layer holds the post-synaptic nodes.
    pub entering: Vec<LinkId>,
    /// Links for which this layer holds the pre-synaptic nodes.
    pub exiting: Vec<LinkId>,
    /// Arcs entering this layer only learn while this is set.
    pub learning: bool,
    /// Inactive layers neither update nor feed downstream sums.
    pub active: bool,
    pub quiescent: bool,
    /// Upper bound on settling rounds; below 1 the layer runs a single
    /// pass regardless of the quiescent flag.
    pub max_settling: usize,
    /// Inhibitor layer spliced in by an associative module, if any.
    pub inhibitor: Option<LayerId>,
}

impl Layer {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of a node inside this layer; used for positional
    /// export of arc endpoints.
    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }
}
