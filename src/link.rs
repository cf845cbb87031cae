//! Links: the generators and owners of the arcs between two layers,
//! together with the learning policy those arcs share.

use serde::{Deserialize, Serialize};

use crate::graph::{ArcId, LayerId};
use crate::rng::Prng;

/// Inclusion probability used by [`Topology::stochastic`].
pub const STOCHASTIC_DENSITY: f32 = 0.4;

/// Correlation threshold used by [`Rule::general_hebbian`].
pub const GENERAL_HEBB_THRESHOLD: f32 = 0.5;

/// How a link wires its pre-layer to its post-layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Topology {
    /// Pair nodes by position; full coverage needs equal sizes.
    #[default]
    OneToOne,
    /// Complete cross product.
    Full,
    /// Each pair included independently with probability `p`.
    Stochastic { p: f32 },
    /// Cross product minus the diagonal; the classic lateral-inhibition
    /// wiring for self-links.
    Triangulate,
    /// Two wrap-around fan passes over the longer side; overlapping
    /// many-to-one coverage for sensor fan-in.
    TwoToOne,
    /// Exactly these (pre-index, post-index) pairs, in order.
    Explicit(Vec<(usize, usize)>),
}

impl Topology {
    /// Stochastic wiring at the conventional 0.4 density.
    pub fn stochastic() -> Self {
        Topology::Stochastic {
            p: STOCHASTIC_DENSITY,
        }
    }

    /// Materialize the (pre-index, post-index) pairs for layer sizes
    /// `n` (pre) and `m` (post).
    pub fn pairs(&self, n: usize, m: usize, rng: &mut Prng) -> Vec<(usize, usize)> {
        if n == 0 || m == 0 {
            return Vec::new();
        }
        match self {
            Topology::OneToOne => (0..n.min(m)).map(|i| (i, i)).collect(),
            Topology::Full => {
                let mut out = Vec::with_capacity(n * m);
                for i in 0..n {
                    for j in 0..m {
                        out.push((i, j));
                    }
                }
                out
            }
            Topology::Stochastic { p } => {
                let mut out = Vec::new();
                for i in 0..n {
                    for j in 0..m {
                        if rng.chance(*p) {
                            out.push((i, j));
                        }
                    }
                }
                out
            }
            Topology::Triangulate => {
                let mut out = Vec::with_capacity(n * m);
                for i in 0..n {
                    for j in 0..m {
                        if i != j {
                            out.push((i, j));
                        }
                    }
                }
                out
            }
            Topology::TwoToOne => {
                // Wrap-around fan, kept literally; the overlap between
                // the two shifted passes is intentional.
                let span = n.max(m);
                let mut out = Vec::with_capacity(2 * span);
                for pass in 0..2 {
                    for i in 0..span {
                        out.push((i % n, (i + pass) % m));
                    }
                }
                out
            }
            Topology::Explicit(pairs) => pairs.clone(),
        }
    }
}

/// The weight-update rule shared by every arc of a link.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Rule {
    /// Non-plastic; weights never move.
    #[default]
    Fixed,
    /// `rate * pre * post`.
    Hebbian,
    /// `rate * (pre - t) * (post - t)`: reinforces correlation and
    /// suppresses anti-correlation around the threshold.
    GeneralHebbian { threshold: f32 },
    /// `rate * pre * (post - pre * weight)`: Hebbian with bounded
    /// weight growth.
    Oja,
}

impl Rule {
    /// General Hebbian at the conventional 0.5 threshold.
    pub fn general_hebbian() -> Self {
        Rule::GeneralHebbian {
            threshold: GENERAL_HEBB_THRESHOLD,
        }
    }

    /// Weight increment for one arc.
    pub fn delta(self, rate: f32, pre: f32, post: f32, weight: f32) -> f32 {
        match self {
            Rule::Fixed => 0.0,
            Rule::Hebbian => rate * pre * post,
            Rule::GeneralHebbian { threshold } => rate * (pre - threshold) * (post - threshold),
            Rule::Oja => rate * pre * (post - pre * weight),
        }
    }
}

/// Arena record for one link. Arcs are generated exactly once; an
/// already-populated arc list is never regenerated.
#[derive(Debug, Clone)]
pub struct Link {
    pub pre: LayerId,
    pub post: LayerId,
    pub topology: Topology,
    /// Uniform range for randomly initialized weights.
    pub weight_range: (f32, f32),
    /// Per-arc initial weights, by arc order; used only when the list
    /// covers every arc, otherwise the range applies.
    pub init_weights: Option<Vec<f32>>,
    pub rate: f32,
    pub rule: Rule,
    pub arcs: Vec<ArcId>,
}

impl Link {
    /// Initial weight for the arc at `idx` of `count` total.
    pub fn initial_weight(&self, idx: usize, count: usize, rng: &mut Prng) -> f32 {
        match &self.init_weights {
            Some(ws) if ws.len() >= count => ws[idx],
            _ => rng.weight_in(self.weight_range.0, self.weight_range.1),
        }
    }
}
