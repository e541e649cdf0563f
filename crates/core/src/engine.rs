//! Reference host loop: seeded pool generation, turn scheduling and the
//! final score ledger.

use crate::{
    build_agent, individual_bonus, is_repeated, Agent, AgentKind, AgentSeat, Decision,
    EngineError, Item, Lookahead, PlayerId, PolicyConfig, RngState, ScoreBreakdown, Slot,
    Subject, TurnScorer, TurnView,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::trace;

/// Probability that the current speaker keeps the floor when they propose.
pub const SPEAKER_CONTINUE_PROB: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSetup {
    pub subjects: u32,
    pub memory_size: usize,
    pub conversation_length: usize,
    /// Pauses in a row that end the conversation early.
    pub max_consecutive_pauses: usize,
}

impl Default for GameSetup {
    fn default() -> Self {
        Self {
            subjects: 20,
            memory_size: 10,
            conversation_length: 10,
            max_consecutive_pauses: 3,
        }
    }
}

impl GameSetup {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.subjects == 0 {
            return Err(EngineError::InvalidSetup("subjects must be > 0".to_string()));
        }
        if self.conversation_length == 0 {
            return Err(EngineError::InvalidSetup(
                "conversation length must be > 0".to_string(),
            ));
        }
        if self.max_consecutive_pauses == 0 {
            return Err(EngineError::InvalidSetup(
                "max consecutive pauses must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: PlayerId,
    pub kind: AgentKind,
    pub label: String,
    pub preferences: Vec<Subject>,
    pub shared: f64,
    pub individual: f64,
    pub total: f64,
    pub contributions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub seed: u64,
    pub history: Vec<Slot>,
    pub shared: ScoreBreakdown,
    pub shared_total: f64,
    pub participants: Vec<ParticipantRecord>,
    pub early_termination: bool,
}

struct Participant {
    agent: Box<dyn Agent>,
    kind: AgentKind,
    label: String,
    preferences: Vec<Subject>,
    pool: Vec<Item>,
    contributions: u32,
}

pub struct Engine {
    setup: GameSetup,
    seed: u64,
    rng: RngState,
    ids: Vec<PlayerId>,
    participants: Vec<Participant>,
    history: Vec<Slot>,
    consecutive_pauses: usize,
}

impl Engine {
    pub fn new(
        setup: GameSetup,
        roster: &[AgentKind],
        config: &PolicyConfig,
        seed: u64,
    ) -> Result<Self, EngineError> {
        setup.validate()?;
        if roster.is_empty() {
            return Err(EngineError::EmptyRoster);
        }
        let mut rng = RngState::from_seed(seed);
        let mut next_item_id = 1u64;
        let mut label_counts: HashMap<AgentKind, usize> = HashMap::new();
        let mut ids = Vec::with_capacity(roster.len());
        let mut participants = Vec::with_capacity(roster.len());
        for (idx, kind) in roster.iter().copied().enumerate() {
            let id = PlayerId(idx as u32);
            let mut preferences: Vec<Subject> = (0..setup.subjects).collect();
            rng.shuffle(&mut preferences);
            let mut pool = Vec::with_capacity(setup.memory_size);
            for _ in 0..setup.memory_size {
                let subjects = draw_subjects(&mut rng, setup.subjects);
                let importance = rng.gen_unit_f64();
                pool.push(Item::new(next_item_id, &subjects, importance, id));
                next_item_id += 1;
            }
            let seat = AgentSeat {
                id,
                preferences: preferences.clone(),
                seed: RngState::derive(seed, idx as u64 + 1).next_u64(),
            };
            let count = label_counts.entry(kind).or_insert(0);
            *count += 1;
            let label = if *count == 1 {
                kind.id().to_string()
            } else {
                format!("{}#{}", kind.id(), count)
            };
            ids.push(id);
            participants.push(Participant {
                agent: build_agent(kind, seat, config),
                kind,
                label,
                preferences,
                pool,
                contributions: 0,
            });
        }
        Ok(Self {
            setup,
            seed,
            rng,
            ids,
            participants,
            history: Vec::new(),
            consecutive_pauses: 0,
        })
    }

    pub fn setup(&self) -> &GameSetup {
        &self.setup
    }

    pub fn history(&self) -> &[Slot] {
        &self.history
    }

    pub fn participant_ids(&self) -> &[PlayerId] {
        &self.ids
    }

    pub fn is_finished(&self) -> bool {
        self.history.len() >= self.setup.conversation_length
            || self.consecutive_pauses >= self.setup.max_consecutive_pauses
    }

    /// Play one turn and return the committed slot.
    pub fn step(&mut self) -> Slot {
        let view = TurnView {
            history: &self.history,
            participants: &self.ids,
            conversation_length: self.setup.conversation_length,
        };
        let mut proposals: Vec<(usize, Item)> = Vec::new();
        for (idx, participant) in self.participants.iter_mut().enumerate() {
            if let Decision::Propose(item) = participant.agent.propose(&view, &mut participant.pool)
            {
                proposals.push((idx, item));
            }
        }

        let chosen = self.pick_speaker(&proposals);
        let mut committed = Slot::Pause;
        for (pos, (idx, item)) in proposals.into_iter().enumerate() {
            if Some(pos) == chosen {
                self.participants[idx].contributions += 1;
                committed = Slot::Item(item);
            } else {
                // unheard proposals go back to their owner
                self.participants[idx].pool.push(item);
            }
        }

        if committed.is_pause() {
            self.consecutive_pauses += 1;
        } else {
            self.consecutive_pauses = 0;
        }
        trace!(
            seed = self.seed,
            turn = self.history.len(),
            slot = %crate::format_slot(&committed),
            "turn"
        );
        self.history.push(committed.clone());
        committed
    }

    /// The current speaker keeps the floor with `SPEAKER_CONTINUE_PROB`;
    /// otherwise the least-heard proposers draw lots.
    fn pick_speaker(&mut self, proposals: &[(usize, Item)]) -> Option<usize> {
        if proposals.is_empty() {
            return None;
        }
        let speaker = self
            .history
            .last()
            .and_then(Slot::item)
            .map(|item| item.owner);
        if let Some(pos) = proposals
            .iter()
            .position(|(idx, _)| Some(self.ids[*idx]) == speaker)
        {
            if self.rng.gen_bool(SPEAKER_CONTINUE_PROB) {
                return Some(pos);
            }
        }
        let fewest = proposals
            .iter()
            .map(|(idx, _)| self.participants[*idx].contributions)
            .min()
            .unwrap_or(0);
        let candidates = proposals
            .iter()
            .enumerate()
            .filter(|(_, (idx, _))| self.participants[*idx].contributions == fewest)
            .map(|(pos, _)| pos)
            .collect::<Vec<_>>();
        self.rng.choose(&candidates).copied()
    }

    /// The deadline is checked before every turn, never inside one.
    pub fn run(mut self, deadline: Option<Instant>) -> Result<TrialRecord, EngineError> {
        let started = Instant::now();
        while !self.is_finished() {
            if let Some(limit) = deadline {
                if Instant::now() >= limit {
                    return Err(EngineError::DeadlineExceeded {
                        turn: self.history.len(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
            self.step();
        }
        Ok(self.into_record())
    }

    pub fn into_record(self) -> TrialRecord {
        let shared = TurnScorer::shared().history_score(&self.history, Lookahead::Include);
        let shared_total = shared.shared();
        let participants = self
            .participants
            .iter()
            .zip(&self.ids)
            .map(|(participant, id)| {
                let individual = individual_total(&self.history, &participant.preferences);
                ParticipantRecord {
                    id: *id,
                    kind: participant.kind,
                    label: participant.label.clone(),
                    preferences: participant.preferences.clone(),
                    shared: shared_total,
                    individual,
                    total: shared_total + individual,
                    contributions: participant.contributions,
                }
            })
            .collect();
        TrialRecord {
            seed: self.seed,
            early_termination: self.history.len() < self.setup.conversation_length,
            history: self.history,
            shared,
            shared_total,
            participants,
        }
    }
}

/// Sum of one participant's preference bonus over every first mention.
pub fn individual_total(history: &[Slot], preferences: &[Subject]) -> f64 {
    history
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.item().map(|item| (idx, item)))
        .filter(|(idx, item)| !is_repeated(item, &history[..*idx]))
        .map(|(_, item)| individual_bonus(item, preferences))
        .sum()
}

fn draw_subjects(rng: &mut RngState, subjects: u32) -> Vec<Subject> {
    let first = rng.gen_index(subjects as usize) as Subject;
    if subjects < 2 || rng.gen_bool(0.5) {
        return vec![first];
    }
    let mut second = rng.gen_index(subjects as usize - 1) as Subject;
    if second >= first {
        second += 1;
    }
    vec![first, second]
}
