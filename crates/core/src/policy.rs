use crate::{
    Item, PerformanceTracker, PlayerId, PolicyConfig, RngState, ScoreBreakdown, ScoreWeights,
    Slot, Subject, TurnScorer,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Threshold used before anything has been said: any candidate clears it.
pub const OPENING_THRESHOLD: f64 = -1000.0;
pub const RECENT_TURNS_PER_PLAYER: usize = 5;

/// What a participant sees when asked to act.
#[derive(Debug, Clone, Copy)]
pub struct TurnView<'a> {
    pub history: &'a [Slot],
    pub participants: &'a [PlayerId],
    pub conversation_length: usize,
}

impl<'a> TurnView<'a> {
    pub fn turn_index(&self) -> usize {
        self.history.len()
    }

    pub fn is_last_turn(&self) -> bool {
        self.history.len() + 1 >= self.conversation_length
    }

    pub fn previous_is_pause(&self) -> bool {
        self.history.last().is_some_and(Slot::is_pause)
    }

    pub fn current_speaker(&self) -> Option<PlayerId> {
        self.history
            .last()
            .and_then(Slot::item)
            .map(|item| item.owner)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Propose(Item),
    Pause,
}

impl Decision {
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Propose(item) => Some(item),
            Self::Pause => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Pause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    EmptyPool,
    Opening,
    ForcedAfterPauses,
    Threshold,
    Altruism,
    LastTurn,
    BelowThreshold,
    BelowAltruism,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionTrace {
    pub turn: usize,
    pub reason: DecisionReason,
    pub best_delta: Option<f64>,
    pub bar: Option<f64>,
}

#[derive(Debug, Clone)]
struct Candidate {
    index: usize,
    breakdown: ScoreBreakdown,
    delta: f64,
}

/// Opponent-aware propose/pause policy.
///
/// Carries no state between turns except the performance tracker, the
/// count of history slots already fed to it, and the run of own pauses.
#[derive(Debug, Clone)]
pub struct AdaptivePolicy {
    id: PlayerId,
    config: PolicyConfig,
    scorer: TurnScorer,
    shared_weights: ScoreWeights,
    tracker: PerformanceTracker,
    rng: RngState,
    observed: usize,
    consecutive_pauses: u32,
    last_trace: Option<DecisionTrace>,
}

impl AdaptivePolicy {
    pub fn new(id: PlayerId, config: PolicyConfig, preferences: Vec<Subject>, seed: u64) -> Self {
        let scorer = TurnScorer::new(config.weights, preferences)
            .with_repeat_individual(config.repeat_keeps_individual);
        Self {
            id,
            config,
            scorer,
            shared_weights: ScoreWeights {
                individual: 0.0,
                ..config.weights
            },
            tracker: PerformanceTracker::from_config(&config),
            rng: RngState::from_seed(seed),
            observed: 0,
            consecutive_pauses: 0,
            last_trace: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn scorer(&self) -> &TurnScorer {
        &self.scorer
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    pub fn consecutive_pauses(&self) -> u32 {
        self.consecutive_pauses
    }

    pub fn last_trace(&self) -> Option<&DecisionTrace> {
        self.last_trace.as_ref()
    }

    pub fn decide(&mut self, view: &TurnView<'_>, pool: &mut Vec<Item>) -> Decision {
        self.observe(view.history);
        let (chosen, trace) = self.choose(view, pool);
        debug!(
            player = %self.id,
            turn = trace.turn,
            reason = ?trace.reason,
            best = ?trace.best_delta,
            bar = ?trace.bar,
            "decision"
        );
        self.last_trace = Some(trace);
        match chosen {
            Some(index) => {
                self.consecutive_pauses = 0;
                Decision::Propose(pool.remove(index))
            }
            None => {
                self.consecutive_pauses = self.consecutive_pauses.saturating_add(1);
                Decision::Pause
            }
        }
    }

    /// Feed every opponent slot committed since the last call to the tracker.
    pub fn observe(&mut self, history: &[Slot]) {
        self.observed = self.observed.min(history.len());
        for idx in self.observed..history.len() {
            let Slot::Item(item) = &history[idx] else {
                continue;
            };
            if item.owner == self.id {
                continue;
            }
            let delta = self
                .scorer
                .evaluate(item, idx, history)
                .weighted_total(&self.shared_weights);
            self.tracker.update(item.owner, delta);
        }
        self.observed = history.len();
    }

    /// Mean weighted delta over the last `5 × players` slots; pauses count as 0.
    pub fn recent_average(&self, history: &[Slot], players: usize) -> f64 {
        let window = RECENT_TURNS_PER_PLAYER * players.max(1);
        let start = history.len().saturating_sub(window);
        let span = history.len() - start;
        if span == 0 {
            return 0.0;
        }
        let total: f64 = (start..history.len())
            .filter_map(|idx| history[idx].item().map(|item| (idx, item)))
            .map(|(idx, item)| self.scorer.delta(item, idx, history))
            .sum();
        total / span as f64
    }

    fn best_candidate(&self, history: &[Slot], pool: &[Item]) -> Option<Candidate> {
        let turn = history.len();
        let mut best: Option<Candidate> = None;
        for (index, item) in pool.iter().enumerate() {
            let breakdown = self.scorer.evaluate(item, turn, history);
            let delta = breakdown.weighted_total(&self.scorer.weights);
            if best.as_ref().map_or(true, |current| delta > current.delta) {
                best = Some(Candidate {
                    index,
                    breakdown,
                    delta,
                });
            }
        }
        best
    }

    fn choose(&mut self, view: &TurnView<'_>, pool: &[Item]) -> (Option<usize>, DecisionTrace) {
        let turn = view.turn_index();
        let Some(best) = self.best_candidate(view.history, pool) else {
            return (None, trace(turn, DecisionReason::EmptyPool, None, None));
        };
        let delta = Some(best.delta);

        if turn == 0 {
            let opening = trace(turn, DecisionReason::Opening, delta, Some(OPENING_THRESHOLD));
            return (Some(best.index), opening);
        }
        if self.consecutive_pauses >= self.config.max_consecutive_pauses {
            let forced = trace(turn, DecisionReason::ForcedAfterPauses, delta, None);
            return (Some(best.index), forced);
        }

        let last_turn = view.is_last_turn();
        let last_turn_bar = self.config.last_turn_threshold;
        let relax = |bar: f64| {
            if last_turn {
                bar.min(last_turn_bar)
            } else {
                bar
            }
        };

        if self.rng.gen_bool(self.config.altruism_use_prob) {
            let expected = match self.forecast_opponent(view) {
                Some(opponent) => self.tracker.trusted_mean(opponent),
                None => self.tracker.global_mean(),
            };
            let bar = relax(expected - self.config.tau_margin);
            let own = best.breakdown.weighted_total(&self.shared_weights);
            let reason = if own >= bar {
                DecisionReason::Altruism
            } else {
                DecisionReason::BelowAltruism
            };
            let speak = reason == DecisionReason::Altruism;
            return (
                speak.then_some(best.index),
                trace(turn, reason, Some(own), Some(bar)),
            );
        }

        let mut threshold = self.recent_average(view.history, view.participants.len());
        if view.previous_is_pause() && best.breakdown.freshness > 0.0 {
            threshold -= self.config.epsilon_fresh;
        }
        if best.breakdown.nonmonotony < 0.0 {
            threshold += self.config.epsilon_mono;
        }
        let bar = relax(threshold);
        let reason = if best.delta > bar {
            if last_turn && best.delta <= threshold {
                DecisionReason::LastTurn
            } else {
                DecisionReason::Threshold
            }
        } else {
            DecisionReason::BelowThreshold
        };
        let speak = reason != DecisionReason::BelowThreshold;
        (speak.then_some(best.index), trace(turn, reason, delta, Some(bar)))
    }

    /// Who is likely to speak if we stay silent: the current speaker with
    /// probability `current_speaker_edge`, otherwise a uniform pick.
    fn forecast_opponent(&mut self, view: &TurnView<'_>) -> Option<PlayerId> {
        let others = view
            .participants
            .iter()
            .copied()
            .filter(|player| *player != self.id)
            .collect::<Vec<_>>();
        if others.is_empty() {
            return None;
        }
        if let Some(speaker) = view.current_speaker().filter(|p| *p != self.id) {
            if self.rng.gen_bool(self.config.current_speaker_edge) {
                return Some(speaker);
            }
        }
        self.rng.choose(&others).copied()
    }
}

fn trace(
    turn: usize,
    reason: DecisionReason,
    best_delta: Option<f64>,
    bar: Option<f64>,
) -> DecisionTrace {
    DecisionTrace {
        turn,
        reason,
        best_delta,
        bar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: PlayerId = PlayerId(0);
    const OTHER: PlayerId = PlayerId(1);

    fn item(id: u64, subjects: &[Subject], importance: f64, owner: PlayerId) -> Item {
        Item::new(id, subjects, importance, owner)
    }

    fn policy(config: PolicyConfig) -> AdaptivePolicy {
        AdaptivePolicy::new(ME, config, vec![0, 1, 2, 3, 4], 7)
    }

    #[test]
    fn empty_pool_pauses() {
        let mut p = policy(PolicyConfig::default());
        let view = TurnView {
            history: &[],
            participants: &[ME, OTHER],
            conversation_length: 10,
        };
        let mut pool = Vec::new();
        assert_eq!(p.decide(&view, &mut pool), Decision::Pause);
        assert_eq!(p.last_trace().map(|t| t.reason), Some(DecisionReason::EmptyPool));
    }

    #[test]
    fn opening_turn_proposes_best_and_removes_it() {
        let mut p = policy(PolicyConfig::default());
        let view = TurnView {
            history: &[],
            participants: &[ME, OTHER],
            conversation_length: 10,
        };
        let mut pool = vec![item(1, &[3], 0.1, ME), item(2, &[0], 0.9, ME)];
        let decision = p.decide(&view, &mut pool);
        assert_eq!(decision.item().map(|i| i.id.0), Some(2));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id.0, 1);
    }

    #[test]
    fn ties_pick_first_candidate() {
        let mut p = policy(PolicyConfig::default());
        let view = TurnView {
            history: &[],
            participants: &[ME],
            conversation_length: 10,
        };
        let mut pool = vec![item(5, &[1], 0.5, ME), item(6, &[1], 0.5, ME)];
        assert_eq!(p.decide(&view, &mut pool).item().map(|i| i.id.0), Some(5));
    }

    #[test]
    fn pauses_below_recent_average_then_forced() {
        let config = PolicyConfig {
            max_consecutive_pauses: 2,
            ..PolicyConfig::default()
        };
        let mut p = policy(config);
        let history = vec![
            Slot::Item(item(10, &[0], 1.0, OTHER)),
            Slot::Item(item(11, &[0], 1.0, OTHER)),
        ];
        let view = TurnView {
            history: &history,
            participants: &[ME, OTHER],
            conversation_length: 20,
        };
        // a weak, off-topic item: coherence -1, importance 0
        let mut pool = vec![item(1, &[4], 0.0, ME)];
        assert!(p.decide(&view, &mut pool).is_pause());
        assert!(p.decide(&view, &mut pool).is_pause());
        assert_eq!(p.consecutive_pauses(), 2);
        let forced = p.decide(&view, &mut pool);
        assert_eq!(forced.item().map(|i| i.id.0), Some(1));
        assert_eq!(
            p.last_trace().map(|t| t.reason),
            Some(DecisionReason::ForcedAfterPauses)
        );
        assert_eq!(p.consecutive_pauses(), 0);
    }

    #[test]
    fn last_turn_relaxes_threshold() {
        let mut p = policy(PolicyConfig::default());
        let history = vec![
            Slot::Item(item(10, &[0], 1.0, OTHER)),
            Slot::Item(item(11, &[0], 1.0, OTHER)),
        ];
        let view = TurnView {
            history: &history,
            participants: &[ME, OTHER],
            conversation_length: 3,
        };
        // recent average is 2.0; this item is worth 0.5 - 1 + 0.9 = 0.4
        let mut pool = vec![item(1, &[0, 1], 0.5, ME)];
        let decision = p.decide(&view, &mut pool);
        assert!(!decision.is_pause());
        assert_eq!(p.last_trace().map(|t| t.reason), Some(DecisionReason::LastTurn));
    }

    #[test]
    fn observe_feeds_only_opponents_once() {
        let mut p = policy(PolicyConfig::default());
        let history = vec![
            Slot::Item(item(10, &[0], 0.5, OTHER)),
            Slot::Pause,
            Slot::Item(item(11, &[1], 0.5, ME)),
        ];
        p.observe(&history);
        p.observe(&history);
        assert_eq!(p.tracker().samples(OTHER), 1);
        assert_eq!(p.tracker().samples(ME), 0);
        assert_eq!(p.tracker().global_mean(), 0.5);
    }

    #[test]
    fn altruism_compares_against_expected_opponent() {
        let config = PolicyConfig {
            altruism_use_prob: 1.0,
            tau_margin: 0.0,
            min_samples: 1,
            current_speaker_edge: 1.0,
            ..PolicyConfig::default()
        };
        let mut p = policy(config);
        let history = vec![Slot::Item(item(10, &[2], 0.9, OTHER))];
        let view = TurnView {
            history: &history,
            participants: &[ME, OTHER],
            conversation_length: 10,
        };
        // opponent is tracked at 0.9; our off-topic item is worth 0.3 - 1
        let mut pool = vec![item(1, &[3], 0.3, ME)];
        assert!(p.decide(&view, &mut pool).is_pause());
        assert_eq!(
            p.last_trace().map(|t| t.reason),
            Some(DecisionReason::BelowAltruism)
        );

        // an on-topic important item clears the bar
        let mut pool = vec![item(2, &[2], 1.0, ME)];
        let mut fresh = policy(config);
        assert!(!fresh.decide(&view, &mut pool).is_pause());
        assert_eq!(
            fresh.last_trace().map(|t| t.reason),
            Some(DecisionReason::Altruism)
        );
    }

    #[test]
    fn recent_average_counts_pauses_as_zero() {
        let p = policy(PolicyConfig {
            weights: ScoreWeights::shared_only(),
            ..PolicyConfig::default()
        });
        let history = vec![Slot::Item(item(10, &[0], 1.0, OTHER)), Slot::Pause];
        assert!((p.recent_average(&history, 1) - 0.5).abs() < 1e-12);
    }
}
