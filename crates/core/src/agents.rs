use crate::{
    is_repeated, AdaptivePolicy, CoreError, Decision, Item, ItemId, PlayerId, PolicyConfig,
    RngState, Subject, TurnScorer, TurnView,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Closed set of participant archetypes a roster can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Adaptive,
    Greedy,
    ImportanceFirst,
    Random,
    Pause,
    RandomPause,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        Self::Adaptive,
        Self::Greedy,
        Self::ImportanceFirst,
        Self::Random,
        Self::Pause,
        Self::RandomPause,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Greedy => "greedy",
            Self::ImportanceFirst => "importance",
            Self::Random => "random",
            Self::Pause => "pause",
            Self::RandomPause => "random_pause",
        }
    }

    pub fn from_alias(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "adaptive" | "p10" => Some(Self::Adaptive),
            "greedy" | "p0" => Some(Self::Greedy),
            "importance" | "importance_first" | "p5" => Some(Self::ImportanceFirst),
            "random" | "pr" => Some(Self::Random),
            "pause" | "pp" => Some(Self::Pause),
            "random_pause" | "prp" => Some(Self::RandomPause),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AgentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| CoreError::UnknownArchetype(s.trim().to_string()))
    }
}

/// Per-participant construction inputs handed out by the host.
#[derive(Debug, Clone)]
pub struct AgentSeat {
    pub id: PlayerId,
    pub preferences: Vec<Subject>,
    pub seed: u64,
}

pub trait Agent: Send {
    fn id(&self) -> PlayerId;
    fn kind(&self) -> AgentKind;
    /// Pick an item out of `pool` or pause. A proposed item leaves the pool.
    fn propose(&mut self, view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision;
}

pub fn build_agent(kind: AgentKind, seat: AgentSeat, config: &PolicyConfig) -> Box<dyn Agent> {
    match kind {
        AgentKind::Adaptive => Box::new(AdaptivePolicy::new(
            seat.id,
            *config,
            seat.preferences,
            seat.seed,
        )),
        AgentKind::Greedy => Box::new(GreedyAgent::new(seat)),
        AgentKind::ImportanceFirst => Box::new(ImportanceFirstAgent::new(seat)),
        AgentKind::Random => Box::new(RandomAgent::new(seat, 0.0)),
        AgentKind::Pause => Box::new(PauseAgent { id: seat.id }),
        AgentKind::RandomPause => Box::new(RandomAgent::new(seat, 0.5)),
    }
}

impl Agent for AdaptivePolicy {
    fn id(&self) -> PlayerId {
        AdaptivePolicy::id(self)
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Adaptive
    }

    fn propose(&mut self, view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision {
        self.decide(view, pool)
    }
}

/// Speaks whenever its best item adds positive value.
#[derive(Debug, Clone)]
pub struct GreedyAgent {
    id: PlayerId,
    scorer: TurnScorer,
}

impl GreedyAgent {
    pub fn new(seat: AgentSeat) -> Self {
        Self {
            id: seat.id,
            scorer: TurnScorer::new(Default::default(), seat.preferences),
        }
    }
}

impl Agent for GreedyAgent {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Greedy
    }

    fn propose(&mut self, view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision {
        let turn = view.turn_index();
        let mut best: Option<(usize, f64)> = None;
        for (idx, item) in pool.iter().enumerate() {
            let delta = self.scorer.delta(item, turn, view.history);
            if best.map_or(true, |(_, current)| delta > current) {
                best = Some((idx, delta));
            }
        }
        match best {
            Some((idx, delta)) if turn == 0 || delta > 0.0 => Decision::Propose(pool.remove(idx)),
            _ => Decision::Pause,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ranked {
    importance: f64,
    id: ItemId,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    // lower id wins ties so heap order is deterministic
    fn cmp(&self, other: &Self) -> Ordering {
        self.importance
            .total_cmp(&other.importance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Keeps a max-heap of unused items per subject and stays on topic with the
/// most important item it has for the subject just discussed.
#[derive(Debug, Clone)]
pub struct ImportanceFirstAgent {
    id: PlayerId,
}

impl ImportanceFirstAgent {
    pub fn new(seat: AgentSeat) -> Self {
        Self { id: seat.id }
    }

    fn blocks(pool: &[Item], view: &TurnView<'_>) -> HashMap<Subject, BinaryHeap<Ranked>> {
        let mut blocks: HashMap<Subject, BinaryHeap<Ranked>> = HashMap::new();
        for item in pool {
            if is_repeated(item, view.history) {
                continue;
            }
            for subject in &item.subjects {
                blocks.entry(*subject).or_default().push(Ranked {
                    importance: item.importance,
                    id: item.id,
                });
            }
        }
        blocks
    }
}

impl Agent for ImportanceFirstAgent {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::ImportanceFirst
    }

    fn propose(&mut self, view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision {
        let blocks = Self::blocks(pool, view);
        let on_topic = view
            .history
            .last()
            .and_then(|slot| slot.item())
            .and_then(|last| {
                last.subjects
                    .iter()
                    .filter_map(|s| blocks.get(s).and_then(|heap| heap.peek()))
                    .max()
                    .copied()
            });
        let pick = on_topic.or_else(|| {
            blocks
                .values()
                .filter_map(|heap| heap.peek())
                .max()
                .copied()
        });
        match pick.and_then(|ranked| pool.iter().position(|item| item.id == ranked.id)) {
            Some(idx) => Decision::Propose(pool.remove(idx)),
            None => Decision::Pause,
        }
    }
}

/// Uniform pick from the pool, pausing first with `pause_prob`.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    id: PlayerId,
    pause_prob: f64,
    rng: RngState,
}

impl RandomAgent {
    pub fn new(seat: AgentSeat, pause_prob: f64) -> Self {
        Self {
            id: seat.id,
            pause_prob,
            rng: RngState::from_seed(seat.seed),
        }
    }
}

impl Agent for RandomAgent {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        if self.pause_prob > 0.0 {
            AgentKind::RandomPause
        } else {
            AgentKind::Random
        }
    }

    fn propose(&mut self, _view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision {
        if pool.is_empty() || self.rng.gen_bool(self.pause_prob) {
            return Decision::Pause;
        }
        let idx = self.rng.gen_index(pool.len());
        Decision::Propose(pool.remove(idx))
    }
}

#[derive(Debug, Clone)]
pub struct PauseAgent {
    id: PlayerId,
}

impl Agent for PauseAgent {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Pause
    }

    fn propose(&mut self, _view: &TurnView<'_>, _pool: &mut Vec<Item>) -> Decision {
        Decision::Pause
    }
}
