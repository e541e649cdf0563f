use parley_core::{AgentKind, Engine, EngineError, GameSetup, PolicyConfig, TrialRecord};
use std::time::Instant;

/// Everything a host needs to play one seeded conversation.
#[derive(Debug, Clone)]
pub struct TrialSpec {
    pub setup: GameSetup,
    pub roster: Vec<AgentKind>,
    pub policy: PolicyConfig,
    pub seed: u64,
    pub deadline: Option<Instant>,
}

/// The game loop the harness drives. Implementations must build fresh agents
/// for every call.
pub trait GameHost: Sync {
    fn run_trial(&self, spec: &TrialSpec) -> Result<TrialRecord, EngineError>;
}

/// Host backed by the in-tree reference engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceHost;

impl GameHost for ReferenceHost {
    fn run_trial(&self, spec: &TrialSpec) -> Result<TrialRecord, EngineError> {
        Engine::new(spec.setup, &spec.roster, &spec.policy, spec.seed)?.run(spec.deadline)
    }
}
