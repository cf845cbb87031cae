//! Build-time description of a network: plain layers, links addressed
//! by layer name, and the composite module motifs that splice a
//! canonical sub-graph into the host network.
//!
//! Everything here is inert data. The network resolves names, checks
//! the description, and materializes the arenas during initialization.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::graph::Role;
use crate::link::{Rule, Topology};

/// Declaration of a plain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub size: usize,
    pub activation: Activation,
    pub role: Role,
    pub learning: bool,
    pub active: bool,
    pub quiescent: bool,
    pub max_settling: usize,
}

impl LayerDef {
    pub fn new(name: impl Into<String>, size: usize, activation: Activation) -> Self {
        Self {
            name: name.into(),
            size,
            activation,
            role: Role::None,
            learning: true,
            active: true,
            quiescent: true,
            max_settling: 0,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_settling(mut self, rounds: usize) -> Self {
        self.quiescent = true;
        self.max_settling = rounds;
        self
    }
}

/// Declaration of a link. `pre`/`post` are layer names, resolved
/// case-insensitively at initialization; a missing side marks a partial
/// link that a module constructor completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkDef {
    pub pre: Option<String>,
    pub post: Option<String>,
    /// `None` falls back to the 1-1 default at generation time.
    pub topology: Option<Topology>,
    /// Uniform range for random initial weights; `None` falls back to
    /// (0, 1).
    pub weight_range: Option<(f32, f32)>,
    /// Explicit per-arc initial weights, by arc order.
    pub weights: Option<Vec<f32>>,
    pub rate: f32,
    pub rule: Rule,
}

impl LinkDef {
    pub fn new(pre: impl Into<String>, post: impl Into<String>) -> Self {
        Self {
            pre: Some(pre.into()),
            post: Some(post.into()),
            ..Self::default()
        }
    }

    /// A link with neither side bound yet.
    pub fn partial() -> Self {
        Self::default()
    }

    pub fn from_layer(pre: impl Into<String>) -> Self {
        Self {
            pre: Some(pre.into()),
            ..Self::default()
        }
    }

    pub fn to_layer(post: impl Into<String>) -> Self {
        Self {
            post: Some(post.into()),
            ..Self::default()
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn with_range(mut self, low: f32, high: f32) -> Self {
        self.weight_range = Some((low, high));
        self
    }

    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }
}

/// A network member: either a plain layer or a composite module whose
/// internal layers and links are spliced into the host network during
/// flattening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Layer(LayerDef),
    Module(ModuleDef),
}

impl Member {
    /// The layer this member contributes directly.
    pub fn layer(&self) -> &LayerDef {
        match self {
            Member::Layer(def) => def,
            Member::Module(def) => &def.layer,
        }
    }
}

/// A composite layer owning internal members and links. Modules may
/// nest modules; flattening is transitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDef {
    /// The host layer the rest of the network sees.
    pub layer: LayerDef,
    pub members: Vec<Member>,
    pub links: Vec<LinkDef>,
    /// Name of the internal inhibitor layer, when the motif has one.
    /// The network wires mode switching (training vs testing) to it.
    pub inhibitor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitiveConfig {
    pub activation: Activation,
    /// Lateral inhibition weight, negative.
    pub inhibit: f32,
    /// Self-reinforcement weight, positive.
    pub excite: f32,
    pub up: Option<LinkDef>,
    pub down: Option<LinkDef>,
    pub rounds: usize,
}

impl Default for CompetitiveConfig {
    fn default() -> Self {
        Self {
            activation: Activation::Linear,
            inhibit: -1.0,
            excite: 1.0,
            up: None,
            down: None,
            rounds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InhibitoryConfig {
    pub activation: Activation,
    pub inhibit: f32,
    pub excite: f32,
    pub up: Option<LinkDef>,
    pub down: Option<LinkDef>,
}

impl Default for InhibitoryConfig {
    fn default() -> Self {
        Self {
            activation: Activation::Linear,
            inhibit: -1.0,
            excite: 1.0,
            up: None,
            down: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociativeConfig {
    pub activation: Activation,
    pub rule: Rule,
    /// Initial weight range for the plastic pattern store.
    pub initial: (f32, f32),
    pub up: Option<LinkDef>,
    pub down: Option<LinkDef>,
    /// Partial link whose pre side names the layer that drives the
    /// feedforward inhibitor.
    pub inhibit_from: Option<LinkDef>,
    pub rounds: usize,
}

impl Default for AssociativeConfig {
    fn default() -> Self {
        Self {
            activation: Activation::step(),
            rule: Rule::general_hebbian(),
            initial: (0.0, 1.0),
            up: None,
            down: None,
            inhibit_from: None,
            rounds: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerConfig {
    pub up: Option<LinkDef>,
    pub down: Option<LinkDef>,
}

impl ModuleDef {
    /// Competitive motif: linear nodes, fixed negative triangulate
    /// self-inhibition, fixed positive 1-1 self-reinforcement, and
    /// caller-completed boundary links. Competition needs several
    /// settling rounds, so the host runs quiescent.
    pub fn competitive(name: impl Into<String>, size: usize, cfg: CompetitiveConfig) -> Self {
        let name = name.into();
        let layer = LayerDef::new(name.clone(), size, cfg.activation).with_settling(cfg.rounds);

        let lateral = LinkDef::new(name.clone(), name.clone())
            .with_topology(Topology::Triangulate)
            .with_weights(vec![cfg.inhibit; size * size - size]);
        let self_excite = LinkDef::new(name.clone(), name.clone())
            .with_topology(Topology::OneToOne)
            .with_weights(vec![cfg.excite; size]);

        let up = complete_post(cfg.up, &name);
        let down = complete_pre(cfg.down, &name);

        Self {
            layer,
            members: Vec::new(),
            links: vec![lateral, self_excite, up, down],
            inhibitor: None,
        }
    }

    /// Inhibitory motif: a single node integrating all upstream
    /// excitation into downstream suppression. Both boundary links are
    /// non-plastic full fans.
    pub fn inhibitory(name: impl Into<String>, cfg: InhibitoryConfig) -> Self {
        let name = name.into();
        let layer = LayerDef::new(name.clone(), 1, cfg.activation);

        let mut up = complete_post(cfg.up, &name);
        if up.topology.is_none() {
            up.topology = Some(Topology::Full);
        }
        up.rate = 0.0;
        if up.weights.is_none() {
            up.weight_range = Some((cfg.excite, cfg.excite));
        }

        let mut down = complete_pre(cfg.down, &name);
        if down.topology.is_none() {
            down.topology = Some(Topology::Full);
        }
        down.rate = 0.0;
        if down.weights.is_none() {
            down.weight_range = Some((cfg.inhibit, cfg.inhibit));
        }

        Self {
            layer,
            members: Vec::new(),
            links: vec![up, down],
            inhibitor: None,
        }
    }

    /// Associative motif: a fully-connected plastic self-link stores
    /// patterns for completion by spreading activation; a fixed 1-1
    /// load link forces patterns in from upstream; an embedded
    /// inhibitor supplies feedforward suppression while testing.
    pub fn associative(
        name: impl Into<String>,
        size: usize,
        rate: f32,
        cfg: AssociativeConfig,
    ) -> Self {
        let name = name.into();
        let layer = LayerDef::new(name.clone(), size, cfg.activation).with_settling(cfg.rounds);

        let store = LinkDef::new(name.clone(), name.clone())
            .with_topology(Topology::Full)
            .with_range(cfg.initial.0, cfg.initial.1)
            .with_rate(rate)
            .with_rule(cfg.rule);

        let mut up = complete_post(cfg.up, &name);
        if up.topology.is_none() {
            up.topology = Some(Topology::OneToOne);
        }

        let inhibitor_name = format!("{name}_inhibitor");
        let gate = ModuleDef::inhibitory(
            inhibitor_name.clone(),
            InhibitoryConfig {
                up: cfg.inhibit_from,
                down: Some(LinkDef::to_layer(name.clone())),
                ..InhibitoryConfig::default()
            },
        );

        let mut down = complete_pre(cfg.down, &name);
        if down.topology.is_none() {
            down.topology = Some(Topology::OneToOne);
        }
        down.rate = 0.0;
        if down.weight_range.is_none() {
            down.weight_range = Some((1.0, 1.0));
        }

        Self {
            layer,
            members: vec![Member::Module(gate)],
            links: vec![store, up, down],
            inhibitor: Some(inhibitor_name),
        }
    }

    /// Transformer motif: a pass-through layer that reshapes upstream
    /// output for a downstream consumer over a fixed 1-1 load link.
    pub fn transformer(
        name: impl Into<String>,
        size: usize,
        activation: Activation,
        cfg: TransformerConfig,
    ) -> Self {
        let name = name.into();
        let layer = LayerDef::new(name.clone(), size, activation);

        let mut up = complete_post(cfg.up, &name);
        up.topology = Some(Topology::OneToOne);
        up.rate = 0.0;
        if up.weight_range.is_none() {
            up.weight_range = Some((1.0, 1.0));
        }

        let down = complete_pre(cfg.down, &name);

        Self {
            layer,
            members: Vec::new(),
            links: vec![up, down],
            inhibitor: None,
        }
    }
}

// Motif completion binds the host side of a boundary link; whatever
// topology/weights the caller already set are preserved.
fn complete_post(link: Option<LinkDef>, host: &str) -> LinkDef {
    let mut link = link.unwrap_or_default();
    link.post = Some(host.to_string());
    link
}

fn complete_pre(link: Option<LinkDef>, host: &str) -> LinkDef {
    let mut link = link.unwrap_or_default();
    link.pre = Some(host.to_string());
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competitive_wires_both_self_links() {
        let module = ModuleDef::competitive(
            "winners",
            4,
            CompetitiveConfig {
                up: Some(LinkDef::from_layer("retina")),
                down: Some(LinkDef::to_layer("motor")),
                ..CompetitiveConfig::default()
            },
        );

        assert!(module.layer.quiescent);
        assert_eq!(module.layer.max_settling, 10);
        assert_eq!(module.links.len(), 4);

        let lateral = &module.links[0];
        assert_eq!(lateral.topology, Some(Topology::Triangulate));
        assert_eq!(lateral.weights.as_ref().map(Vec::len), Some(12));
        assert!(lateral.weights.as_ref().into_iter().flatten().all(|&w| w < 0.0));

        let boost = &module.links[1];
        assert_eq!(boost.topology, Some(Topology::OneToOne));
        assert_eq!(boost.weights, Some(vec![1.0; 4]));

        // Boundary links got the host side filled in, caller side kept.
        assert_eq!(module.links[2].pre.as_deref(), Some("retina"));
        assert_eq!(module.links[2].post.as_deref(), Some("winners"));
        assert_eq!(module.links[3].pre.as_deref(), Some("winners"));
        assert_eq!(module.links[3].post.as_deref(), Some("motor"));
    }

    #[test]
    fn inhibitory_defaults_to_full_fans() {
        let module = ModuleDef::inhibitory(
            "gate",
            InhibitoryConfig {
                up: Some(LinkDef::from_layer("senses")),
                down: Some(LinkDef::to_layer("store")),
                ..InhibitoryConfig::default()
            },
        );

        assert_eq!(module.layer.size, 1);
        let up = &module.links[0];
        assert_eq!(up.topology, Some(Topology::Full));
        assert_eq!(up.rate, 0.0);
        assert_eq!(up.weight_range, Some((1.0, 1.0)));

        let down = &module.links[1];
        assert_eq!(down.weight_range, Some((-1.0, -1.0)));
    }

    #[test]
    fn inhibitory_keeps_caller_topology_and_weights() {
        let module = ModuleDef::inhibitory(
            "gate",
            InhibitoryConfig {
                up: Some(
                    LinkDef::from_layer("senses")
                        .with_topology(Topology::OneToOne)
                        .with_weights(vec![2.0]),
                ),
                ..InhibitoryConfig::default()
            },
        );

        let up = &module.links[0];
        assert_eq!(up.topology, Some(Topology::OneToOne));
        assert_eq!(up.weights, Some(vec![2.0]));
        // Explicit weights supplied: the range is left alone.
        assert_eq!(up.weight_range, None);
    }

    #[test]
    fn associative_embeds_its_inhibitor() {
        let module = ModuleDef::associative(
            "store",
            8,
            0.2,
            AssociativeConfig {
                up: Some(LinkDef::from_layer("loader")),
                down: Some(LinkDef::to_layer("readout")),
                inhibit_from: Some(LinkDef::from_layer("loader")),
                ..AssociativeConfig::default()
            },
        );

        assert_eq!(module.inhibitor.as_deref(), Some("store_inhibitor"));
        assert_eq!(module.members.len(), 1);
        let Member::Module(gate) = &module.members[0] else {
            panic!("inhibitor should be a nested module");
        };
        assert_eq!(gate.layer.name, "store_inhibitor");
        assert_eq!(gate.links[1].post.as_deref(), Some("store"));

        let store = &module.links[0];
        assert_eq!(store.topology, Some(Topology::Full));
        assert_eq!(store.rate, 0.2);
        assert_eq!(store.rule, Rule::general_hebbian());
    }

    #[test]
    fn transformer_forces_the_load_link() {
        let module = ModuleDef::transformer(
            "shape",
            3,
            Activation::Linear,
            TransformerConfig {
                up: Some(LinkDef::from_layer("raw").with_topology(Topology::Full)),
                down: Some(LinkDef::to_layer("next")),
            },
        );

        // The 1-1 load path is part of the motif's definition.
        assert_eq!(module.links[0].topology, Some(Topology::OneToOne));
        assert_eq!(module.links[0].rate, 0.0);
    }

    #[test]
    fn link_def_round_trips_through_json() {
        let def = LinkDef::new("a", "b")
            .with_topology(Topology::Explicit(vec![(0, 1), (1, 0)]))
            .with_weights(vec![0.25, -0.5])
            .with_rate(0.05)
            .with_rule(Rule::Oja);

        let json = serde_json::to_string(&def).unwrap();
        let back: LinkDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back.topology, def.topology);
        assert_eq!(back.weights, def.weights);
        assert_eq!(back.rate, def.rate);
        assert_eq!(back.rule, def.rule);
    }
}
