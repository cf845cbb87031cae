//! The network: owner of the flattened arenas, derivation of the
//! execution and learning orders, and the recall/training/
//! back-propagation drivers.
//!
//! All mutation is in-process and single-threaded; the execution and
//! learning orders are the discipline that keeps shared layer state
//! hazard-free, not locking.

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use crate::blueprint::{LayerDef, LinkDef, Member, ModuleDef};
use crate::error::{Error, Result};
use crate::graph::{Arc, ArcId, Layer, LayerId, LinkId, Node, NodeId};
use crate::link::{Link, Topology};
use crate::rng::Prng;

/// Engine-level settings; everything else lives on layers and links.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    /// Seed for arc-weight initialization and stochastic topologies.
    /// `None` falls back to a fixed default, keeping runs reproducible.
    pub seed: Option<u64>,
    /// Master switch for quiescent settling; individual layers still
    /// opt in through their own flag and settling bound.
    pub quiescent: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: None,
            quiescent: true,
        }
    }
}

/// Read-only structural counters.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub layer_count: usize,
    pub link_count: usize,
    pub node_count: usize,
    pub arc_count: usize,
    pub avg_weight: f32,
}

pub struct Network {
    cfg: NetworkConfig,

    // Blueprint side, consumed by `init`.
    members: Vec<Member>,
    link_defs: Vec<LinkDef>,
    execution_names: Vec<String>,

    // Flattened arenas.
    nodes: Vec<Node>,
    arcs: Vec<Arc>,
    layers: Vec<Layer>,
    links: Vec<Link>,

    name_index: HashMap<String, LayerId>,
    execution_order: Vec<LayerId>,
    learning_order: Vec<LinkId>,
    input_nodes: Vec<NodeId>,
    output_nodes: Vec<NodeId>,

    rng: Prng,
    initialized: bool,
}

impl Network {
    pub fn new(cfg: NetworkConfig) -> Self {
        let rng = Prng::new(cfg.seed.unwrap_or(1));
        Self {
            cfg,
            members: Vec::new(),
            link_defs: Vec::new(),
            execution_names: Vec::new(),
            nodes: Vec::new(),
            arcs: Vec::new(),
            layers: Vec::new(),
            links: Vec::new(),
            name_index: HashMap::new(),
            execution_order: Vec::new(),
            learning_order: Vec::new(),
            input_nodes: Vec::new(),
            output_nodes: Vec::new(),
            rng,
            initialized: false,
        }
    }

    pub fn add_layer(&mut self, def: LayerDef) {
        self.members.push(Member::Layer(def));
    }

    pub fn add_module(&mut self, def: ModuleDef) {
        self.members.push(Member::Module(def));
    }

    pub fn add_link(&mut self, def: LinkDef) {
        self.link_defs.push(def);
    }

    /// Layer names to update, in order, during each recall. Layers
    /// missing from the list are appended at initialization.
    pub fn set_execution_order<S: Into<String>>(&mut self, names: impl IntoIterator<Item = S>) {
        self.execution_names = names.into_iter().map(Into::into).collect();
    }

    /// Flatten modules, materialize the arenas, and derive both
    /// orders. Later calls are no-ops; the drivers call this on first
    /// use. Every name is resolved before a single arc is generated,
    /// so a failed initialization leaves no partial topology behind.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        // Flatten: top-level links first, then each member splices its
        // internal layers and links, transitively.
        let mut layer_defs: Vec<LayerDef> = Vec::new();
        let mut link_defs: Vec<LinkDef> = self.link_defs.clone();
        let mut inhibitors: Vec<(String, String)> = Vec::new();
        for member in &self.members {
            flatten_member(member, &mut layer_defs, &mut link_defs, &mut inhibitors);
        }

        // Case-insensitive name index; duplicates are configuration
        // errors.
        let mut by_name: HashMap<String, LayerId> = HashMap::with_capacity(layer_defs.len());
        for (id, def) in layer_defs.iter().enumerate() {
            if by_name.insert(def.name.to_lowercase(), id).is_some() {
                return Err(Error::DuplicateLayer {
                    name: def.name.clone(),
                });
            }
        }

        // Resolve the caller's execution order, then append whatever
        // it left out so every layer updates exactly once per recall.
        let mut execution: Vec<LayerId> = Vec::with_capacity(layer_defs.len());
        for name in &self.execution_names {
            let id = *by_name
                .get(&name.to_lowercase())
                .ok_or_else(|| Error::UnknownLayer {
                    name: name.clone(),
                    context: "the execution order".to_string(),
                })?;
            execution.push(id);
        }
        for id in 0..layer_defs.len() {
            if !execution.contains(&id) {
                execution.push(id);
            }
        }

        // Resolve every link endpoint before any arc exists.
        let mut endpoints: Vec<(LayerId, LayerId)> = Vec::with_capacity(link_defs.len());
        for (index, def) in link_defs.iter().enumerate() {
            let pre = resolve_side(&by_name, def.pre.as_deref(), index, "pre")?;
            let post = resolve_side(&by_name, def.post.as_deref(), index, "post")?;
            if let Some(Topology::Explicit(pairs)) = &def.topology {
                let pre_size = layer_defs[pre].size;
                let post_size = layer_defs[post].size;
                for &pair in pairs {
                    if pair.0 >= pre_size || pair.1 >= post_size {
                        return Err(Error::ArcIndexOutOfRange {
                            index,
                            pair,
                            pre_size,
                            post_size,
                        });
                    }
                }
            }
            endpoints.push((pre, post));
        }

        let mut inhibitor_ids: Vec<(LayerId, LayerId)> = Vec::with_capacity(inhibitors.len());
        for (host, inhibitor) in &inhibitors {
            let host_id = *by_name
                .get(&host.to_lowercase())
                .expect("host layer was flattened alongside its module");
            let inh_id =
                *by_name
                    .get(&inhibitor.to_lowercase())
                    .ok_or_else(|| Error::UnknownLayer {
                        name: inhibitor.clone(),
                        context: format!("module `{host}` inhibitor"),
                    })?;
            inhibitor_ids.push((host_id, inh_id));
        }

        // Infallible from here on: build the arenas.
        for def in &layer_defs {
            let id = self.layers.len();
            let first = self.nodes.len();
            for _ in 0..def.size {
                self.nodes.push(Node::new(id));
            }
            self.layers.push(Layer {
                name: def.name.clone(),
                nodes: (first..first + def.size).collect(),
                activation: def.activation,
                role: def.role,
                entering: Vec::new(),
                exiting: Vec::new(),
                learning: def.learning,
                active: def.active,
                quiescent: def.quiescent,
                max_settling: def.max_settling,
                inhibitor: None,
            });
        }
        for (host, inh) in inhibitor_ids {
            self.layers[host].inhibitor = Some(inh);
        }

        // Boundary nodes, in layer-encounter order.
        for layer in &self.layers {
            if layer.role.binds_input() {
                self.input_nodes.extend_from_slice(&layer.nodes);
            }
        }
        for layer in &self.layers {
            if layer.role.binds_output() {
                self.output_nodes.extend_from_slice(&layer.nodes);
            }
        }

        self.execution_order = execution;

        for (index, def) in link_defs.iter().enumerate() {
            let (pre, post) = endpoints[index];
            let id = self.links.len();
            self.links.push(Link {
                pre,
                post,
                topology: def.topology.clone().unwrap_or_default(),
                weight_range: def.weight_range.unwrap_or((0.0, 1.0)),
                init_weights: def.weights.clone(),
                rate: def.rate,
                rule: def.rule,
                arcs: Vec::new(),
            });
            self.layers[post].entering.push(id);
            self.layers[pre].exiting.push(id);
        }
        for id in 0..self.links.len() {
            self.generate_arcs(id);
        }

        debug!(
            layers = self.layers.len(),
            links = self.links.len(),
            nodes = self.nodes.len(),
            arcs = self.arcs.len(),
            "network flattened and materialized"
        );

        self.derive_learning_order();
        self.name_index = by_name;
        self.initialized = true;
        Ok(())
    }

    /// Materialize a link's arcs. Regeneration is guarded: a link that
    /// already owns arcs keeps them, so repeated initialization passes
    /// cannot duplicate topology.
    fn generate_arcs(&mut self, link_id: LinkId) {
        if !self.links[link_id].arcs.is_empty() {
            return;
        }
        let pre_layer = self.links[link_id].pre;
        let post_layer = self.links[link_id].post;
        let n = self.layers[pre_layer].len();
        let m = self.layers[post_layer].len();

        let topology = self.links[link_id].topology.clone();
        let pairs = topology.pairs(n, m, &mut self.rng);
        let count = pairs.len();

        for (idx, (i, j)) in pairs.into_iter().enumerate() {
            let pre = self.layers[pre_layer].nodes[i];
            let post = self.layers[post_layer].nodes[j];
            let weight = {
                let link = &self.links[link_id];
                link.initial_weight(idx, count, &mut self.rng)
            };
            let arc_id = self.arcs.len();
            self.arcs.push(Arc {
                pre,
                post,
                weight,
                init_weight: weight,
                link: link_id,
            });
            self.nodes[pre].outgoing.push(arc_id);
            self.nodes[post].incoming.push(arc_id);
            self.links[link_id].arcs.push(arc_id);
        }
    }

    /// Reverse breadth-first traversal from the output nodes: links
    /// near the output learn first, moving backward toward the inputs.
    /// Both the unsupervised pass and back-propagation need downstream
    /// contributions finalized before they are consumed upstream.
    fn derive_learning_order(&mut self) {
        let mut in_pool = vec![true; self.arcs.len()];
        let mut pool_left = self.arcs.len();
        let mut distance: Vec<Option<usize>> = vec![None; self.links.len()];

        let mut frontier: Vec<NodeId> = self.output_nodes.clone();
        let mut depth = 0usize;

        while pool_left > 0 && !frontier.is_empty() {
            let mut next: Vec<NodeId> = Vec::new();
            for &node in &frontier {
                let layer = self.nodes[node].layer;
                for &link_id in &self.layers[layer].entering {
                    for &arc_id in &self.links[link_id].arcs {
                        if !in_pool[arc_id] {
                            continue;
                        }
                        in_pool[arc_id] = false;
                        pool_left -= 1;
                        // Last write wins: a link touched again in a
                        // later round sinks to that round's distance.
                        distance[link_id] = Some(depth);
                        next.push(self.arcs[arc_id].pre);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }

        let mut ranked: Vec<(LinkId, usize)> = distance
            .iter()
            .enumerate()
            .filter_map(|(id, d)| d.map(|d| (id, d)))
            .collect();
        // Stable: ties keep flattened-collection order.
        ranked.sort_by_key(|&(_, d)| d);
        self.learning_order = ranked.into_iter().map(|(id, _)| id).collect();

        // Links the traversal never reached still learn, last.
        for id in 0..self.links.len() {
            if distance[id].is_none() {
                warn!(
                    link = id,
                    "link unreachable from the output side; appended to the learning order"
                );
                self.learning_order.push(id);
            }
        }

        debug!(order = ?self.learning_order, "derived learning order");
    }

    /// One forward pass: bind inputs positionally, update every layer
    /// in execution order, return the output activations.
    pub fn recall(&mut self, inputs: &[f32]) -> Result<Vec<f32>> {
        self.init()?;
        self.set_inputs(inputs)?;
        for i in 0..self.execution_order.len() {
            let layer = self.execution_order[i];
            self.update_layer(layer);
        }
        Ok(self.outputs())
    }

    /// Recall followed by the unsupervised learning pass over every
    /// link, in learning order.
    pub fn training(&mut self, inputs: &[f32]) -> Result<Vec<f32>> {
        let out = self.recall(inputs)?;
        for i in 0..self.learning_order.len() {
            let link = self.learning_order[i];
            self.learn_link(link);
        }
        Ok(out)
    }

    /// Recall followed by one incremental back-propagation step toward
    /// `targets`, one target per output node.
    pub fn back_propagation(&mut self, inputs: &[f32], targets: &[f32]) -> Result<Vec<f32>> {
        let out = self.recall(inputs)?;
        if targets.len() != self.output_nodes.len() {
            return Err(Error::TargetShape {
                expected: self.output_nodes.len(),
                got: targets.len(),
            });
        }
        for i in 0..self.learning_order.len() {
            let link = self.learning_order[i];
            self.back_propagate_link(link, targets);
        }
        Ok(out)
    }

    /// Recall with no weight update; returns the sum-of-squared-error
    /// against `targets`.
    pub fn test(&mut self, inputs: &[f32], targets: &[f32]) -> Result<f32> {
        let out = self.recall(inputs)?;
        if targets.len() != out.len() {
            return Err(Error::TargetShape {
                expected: out.len(),
                got: targets.len(),
            });
        }
        Ok(out
            .iter()
            .zip(targets)
            .map(|(o, t)| (o - t) * (o - t))
            .sum())
    }

    /// Zero every node and restore every arc's initial weight. The
    /// topology and both derived orders stay as they are.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        for arc in &mut self.arcs {
            arc.reset();
        }
    }

    /// Put every layer into learning mode. Associative hosts drop
    /// their inhibitor and settle-to-quiescence while loading patterns.
    pub fn reset_for_training(&mut self) {
        self.set_mode(true);
    }

    /// Take every layer out of learning mode. Associative hosts get
    /// their inhibitor and quiescent settling back for retrieval.
    pub fn reset_for_testing(&mut self) {
        self.set_mode(false);
    }

    fn set_mode(&mut self, training: bool) {
        for layer in &mut self.layers {
            layer.learning = training;
        }
        for i in 0..self.layers.len() {
            if let Some(inh) = self.layers[i].inhibitor {
                self.layers[inh].active = !training;
                self.layers[i].quiescent = !training;
            }
        }
    }

    /// Bind an input vector positionally onto the input nodes.
    pub fn set_inputs(&mut self, inputs: &[f32]) -> Result<()> {
        if inputs.len() != self.input_nodes.len() {
            return Err(Error::InputShape {
                expected: self.input_nodes.len(),
                got: inputs.len(),
            });
        }
        for (idx, &value) in inputs.iter().enumerate() {
            let node = self.input_nodes[idx];
            self.nodes[node].set_activation(value);
        }
        Ok(())
    }

    /// Output node activation levels, in output-node order.
    pub fn outputs(&self) -> Vec<f32> {
        self.output_nodes
            .iter()
            .map(|&n| self.nodes[n].activation())
            .collect()
    }

    fn update_layer(&mut self, layer_id: LayerId) {
        if !self.layers[layer_id].active {
            return;
        }
        let quiescent = self.cfg.quiescent
            && self.layers[layer_id].quiescent
            && self.layers[layer_id].max_settling >= 1;

        if !quiescent {
            self.update_pass(layer_id);
            return;
        }

        let mut prev = self.activation_bits(layer_id);
        for round in 0..self.layers[layer_id].max_settling {
            self.update_pass(layer_id);
            let cur = self.activation_bits(layer_id);
            if cur == prev {
                trace!(layer = %self.layers[layer_id].name, round, "settled to a fixed point");
                break;
            }
            prev = cur;
        }
    }

    fn update_pass(&mut self, layer_id: LayerId) {
        for i in 0..self.layers[layer_id].nodes.len() {
            let node = self.layers[layer_id].nodes[i];
            self.activate_node(node);
        }
    }

    fn activation_bits(&self, layer_id: LayerId) -> Vec<u32> {
        self.layers[layer_id]
            .nodes
            .iter()
            .map(|&n| self.nodes[n].activation().to_bits())
            .collect()
    }

    fn activate_node(&mut self, node_id: NodeId) {
        // Pure input nodes are driven externally, never recomputed.
        if self.nodes[node_id].incoming.is_empty() {
            return;
        }

        let own_layer = self.nodes[node_id].layer;
        let mut sum = 0.0;
        for k in 0..self.nodes[node_id].incoming.len() {
            let arc = &self.arcs[self.nodes[node_id].incoming[k]];
            let src = &self.nodes[arc.pre];
            if !self.layers[src.layer].active {
                continue;
            }
            // Same-layer sources feed the previous level, so a
            // simultaneous intra-layer pass never reads its own writes;
            // cross-layer sources are final because upstream layers
            // update strictly earlier in the execution order.
            let value = if src.layer == own_layer {
                src.prev_activation()
            } else {
                src.activation()
            };
            sum += arc.weight * value;
        }

        let level = self.layers[own_layer].activation.apply(sum);
        let node = &mut self.nodes[node_id];
        node.potential = sum;
        node.set_activation(level);
    }

    /// Unsupervised weight update for one link. A no-op unless the
    /// link is plastic and the post layer is in learning mode.
    fn learn_link(&mut self, link_id: LinkId) {
        let rate = self.links[link_id].rate;
        if rate == 0.0 {
            return;
        }
        let post_layer = self.links[link_id].post;
        if !self.layers[post_layer].learning {
            return;
        }
        let rule = self.links[link_id].rule;
        for k in 0..self.links[link_id].arcs.len() {
            let arc_id = self.links[link_id].arcs[k];
            let (pre, post, weight) = {
                let arc = &self.arcs[arc_id];
                (
                    self.nodes[arc.pre].activation(),
                    self.nodes[arc.post].activation(),
                    arc.weight,
                )
            };
            self.arcs[arc_id].weight += rule.delta(rate, pre, post, weight);
        }
    }

    /// Three-phase back-propagation contribution of one link.
    fn back_propagate_link(&mut self, link_id: LinkId, targets: &[f32]) {
        let rate = self.links[link_id].rate;
        let pre_layer = self.links[link_id].pre;
        let post_layer = self.links[link_id].post;

        // Phase 1: post-side deltas. Output-bound nodes take their
        // error from the targets; everything else consumes the delta
        // deposited by downstream links.
        let activation = self.layers[post_layer].activation;
        let binds_output = self.layers[post_layer].role.binds_output();
        for k in 0..self.layers[post_layer].nodes.len() {
            let node_id = self.layers[post_layer].nodes[k];
            let a = self.nodes[node_id].activation();
            let error = if binds_output {
                match self.output_index(node_id) {
                    Some(idx) => targets[idx] - a,
                    None => self.nodes[node_id].delta,
                }
            } else {
                self.nodes[node_id].delta
            };
            self.nodes[node_id].delta = activation.derivative(a) * error;
        }

        // Phase 2: push the error one layer upstream through every
        // outgoing arc.
        for k in 0..self.layers[pre_layer].nodes.len() {
            let node_id = self.layers[pre_layer].nodes[k];
            let mut sum = 0.0;
            for j in 0..self.nodes[node_id].outgoing.len() {
                let arc = &self.arcs[self.nodes[node_id].outgoing[j]];
                sum += arc.weight * self.nodes[arc.post].delta;
            }
            self.nodes[node_id].delta = sum;
        }

        // Phase 3: move the weights.
        for k in 0..self.links[link_id].arcs.len() {
            let arc_id = self.links[link_id].arcs[k];
            let (pre, delta) = {
                let arc = &self.arcs[arc_id];
                (
                    self.nodes[arc.pre].activation(),
                    self.nodes[arc.post].delta,
                )
            };
            self.arcs[arc_id].weight += rate * pre * delta;
        }
    }

    fn output_index(&self, node: NodeId) -> Option<usize> {
        self.output_nodes.iter().position(|&n| n == node)
    }

    /// Arc endpoints of a link as (pre-index, post-index) positions
    /// inside its pre/post layers, in current arc order. Feeding the
    /// exported pairs and weights back as an explicit link reproduces
    /// the identical arc set.
    pub fn export_arcs(&self, link_id: LinkId) -> Vec<(usize, usize)> {
        let link = &self.links[link_id];
        let pre = &self.layers[link.pre];
        let post = &self.layers[link.post];
        link.arcs
            .iter()
            .map(|&a| {
                let arc = &self.arcs[a];
                (
                    pre.position_of(arc.pre)
                        .expect("arc pre endpoint belongs to the link's pre layer"),
                    post.position_of(arc.post)
                        .expect("arc post endpoint belongs to the link's post layer"),
                )
            })
            .collect()
    }

    /// Current weight of every arc of a link, in the same order as
    /// [`Network::export_arcs`].
    pub fn export_weights(&self, link_id: LinkId) -> Vec<f32> {
        self.links[link_id]
            .arcs
            .iter()
            .map(|&a| self.arcs[a].weight)
            .collect()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let avg_weight = if self.arcs.is_empty() {
            0.0
        } else {
            self.arcs.iter().map(|a| a.weight.abs()).sum::<f32>() / self.arcs.len() as f32
        };
        Diagnostics {
            layer_count: self.layers.len(),
            link_count: self.links.len(),
            node_count: self.nodes.len(),
            arc_count: self.arcs.len(),
            avg_weight,
        }
    }

    /// Case-insensitive layer lookup; available after initialization.
    pub fn find_layer(&self, name: &str) -> Option<LayerId> {
        self.name_index.get(&name.to_lowercase()).copied()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id]
    }

    pub fn execution_order(&self) -> &[LayerId] {
        &self.execution_order
    }

    pub fn learning_order(&self) -> &[LinkId] {
        &self.learning_order
    }

    pub fn input_nodes(&self) -> &[NodeId] {
        &self.input_nodes
    }

    pub fn output_nodes(&self) -> &[NodeId] {
        &self.output_nodes
    }
}

fn flatten_member(
    member: &Member,
    layers: &mut Vec<LayerDef>,
    links: &mut Vec<LinkDef>,
    inhibitors: &mut Vec<(String, String)>,
) {
    match member {
        Member::Layer(def) => layers.push(def.clone()),
        Member::Module(def) => {
            layers.push(def.layer.clone());
            if let Some(inh) = &def.inhibitor {
                inhibitors.push((def.layer.name.clone(), inh.clone()));
            }
            for nested in &def.members {
                flatten_member(nested, layers, links, inhibitors);
            }
            links.extend(def.links.iter().cloned());
        }
    }
}

fn resolve_side(
    by_name: &HashMap<String, LayerId>,
    name: Option<&str>,
    index: usize,
    side: &'static str,
) -> Result<LayerId> {
    let name = name.ok_or(Error::UnboundLink { index, side })?;
    by_name
        .get(&name.to_lowercase())
        .copied()
        .ok_or_else(|| Error::UnknownLayer {
            name: name.to_string(),
            context: format!("link #{index} ({side} side)"),
        })
}
