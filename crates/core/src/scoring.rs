use crate::{Item, ScoreWeights, Slot, Subject};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const COHERENCE_WINDOW: usize = 3;
pub const FRESHNESS_WINDOW: usize = 5;
pub const MONOTONY_WINDOW: usize = 3;

/// Whether coherence may also look at slots after the scored position.
/// Live proposals never have a future, so only committed history uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookahead {
    Preceding,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBreakdown {
    pub importance: f64,
    pub coherence: f64,
    pub freshness: f64,
    /// Signed: 0 or -1.
    pub nonmonotony: f64,
    pub individual: f64,
}

impl ScoreBreakdown {
    pub fn repeated(individual: f64) -> Self {
        Self {
            importance: 0.0,
            coherence: 0.0,
            freshness: 0.0,
            nonmonotony: -1.0,
            individual,
        }
    }

    pub fn weighted_total(&self, weights: &ScoreWeights) -> f64 {
        weights.importance * self.importance
            + weights.coherence * self.coherence
            + weights.freshness * self.freshness
            + weights.nonmonotony * self.nonmonotony
            + weights.individual * self.individual
    }

    pub fn shared(&self) -> f64 {
        self.importance + self.coherence + self.freshness + self.nonmonotony
    }

    pub fn accumulate(&mut self, other: &ScoreBreakdown) {
        self.importance += other.importance;
        self.coherence += other.coherence;
        self.freshness += other.freshness;
        self.nonmonotony += other.nonmonotony;
        self.individual += other.individual;
    }

    pub fn components(&self) -> [(&'static str, f64); 5] {
        [
            ("importance", self.importance),
            ("coherence", self.coherence),
            ("freshness", self.freshness),
            ("nonmonotony", self.nonmonotony),
            ("individual", self.individual),
        ]
    }
}

/// Scores candidate items from one participant's point of view.
#[derive(Debug, Clone, Default)]
pub struct TurnScorer {
    pub weights: ScoreWeights,
    preferences: Vec<Subject>,
    repeat_keeps_individual: bool,
}

impl TurnScorer {
    pub fn new(weights: ScoreWeights, preferences: Vec<Subject>) -> Self {
        Self {
            weights,
            preferences,
            repeat_keeps_individual: false,
        }
    }

    /// The host's view: unit shared weights, no private preferences.
    pub fn shared() -> Self {
        Self::new(ScoreWeights::shared_only(), Vec::new())
    }

    pub fn with_repeat_individual(mut self, keep: bool) -> Self {
        self.repeat_keeps_individual = keep;
        self
    }

    pub fn preferences(&self) -> &[Subject] {
        &self.preferences
    }

    pub fn evaluate(&self, item: &Item, turn_index: usize, history: &[Slot]) -> ScoreBreakdown {
        self.evaluate_with(item, turn_index, history, Lookahead::Preceding)
    }

    pub fn evaluate_with(
        &self,
        item: &Item,
        turn_index: usize,
        history: &[Slot],
        lookahead: Lookahead,
    ) -> ScoreBreakdown {
        let turn_index = turn_index.min(history.len());
        let individual = individual_bonus(item, &self.preferences);
        if is_repeated(item, &history[..turn_index]) {
            let kept = if self.repeat_keeps_individual {
                individual
            } else {
                0.0
            };
            return ScoreBreakdown::repeated(kept);
        }
        ScoreBreakdown {
            importance: item.importance,
            coherence: coherence(item, turn_index, history, lookahead),
            freshness: freshness(item, turn_index, history),
            nonmonotony: nonmonotony(item, turn_index, history),
            individual,
        }
    }

    pub fn delta(&self, item: &Item, turn_index: usize, history: &[Slot]) -> f64 {
        self.evaluate(item, turn_index, history)
            .weighted_total(&self.weights)
    }

    /// Component sums over every committed item in `history`.
    pub fn history_score(&self, history: &[Slot], lookahead: Lookahead) -> ScoreBreakdown {
        let mut total = ScoreBreakdown::default();
        for (idx, slot) in history.iter().enumerate() {
            if let Slot::Item(item) = slot {
                total.accumulate(&self.evaluate_with(item, idx, history, lookahead));
            }
        }
        total
    }

    pub fn history_total(&self, history: &[Slot], lookahead: Lookahead) -> f64 {
        history
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.item().map(|item| (idx, item)))
            .map(|(idx, item)| {
                self.evaluate_with(item, idx, history, lookahead)
                    .weighted_total(&self.weights)
            })
            .sum()
    }

    /// Counterfactual value of appending `item`: whole-history total with it
    /// minus without it. Uses preceding context only.
    pub fn history_delta(&self, item: &Item, history: &[Slot]) -> f64 {
        let mut extended = history.to_vec();
        extended.push(Slot::Item(item.clone()));
        self.history_total(&extended, Lookahead::Preceding)
            - self.history_total(history, Lookahead::Preceding)
    }
}

pub fn is_repeated(item: &Item, history: &[Slot]) -> bool {
    history
        .iter()
        .filter_map(Slot::item)
        .any(|seen| seen.id == item.id)
}

pub fn coherence(item: &Item, turn_index: usize, history: &[Slot], lookahead: Lookahead) -> f64 {
    let mut context: Vec<&Item> = Vec::new();
    // A silence right before the slot does not empty the context; the walk
    // starts at the nearest committed item and stops at the next pause.
    let preceding = history[..turn_index]
        .iter()
        .rev()
        .skip_while(|slot| slot.is_pause());
    for slot in preceding.take(COHERENCE_WINDOW) {
        match slot {
            Slot::Item(prev) => context.push(prev),
            Slot::Pause => break,
        }
    }
    if lookahead == Lookahead::Include && turn_index < history.len() {
        for slot in history[turn_index + 1..].iter().take(COHERENCE_WINDOW) {
            match slot {
                Slot::Item(next) => context.push(next),
                Slot::Pause => break,
            }
        }
    }
    if context.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<Subject, usize> = HashMap::new();
    for entry in &context {
        for subject in &entry.subjects {
            *counts.entry(*subject).or_insert(0) += 1;
        }
    }
    let mut score = 0.0;
    if !item.subjects.iter().all(|s| counts.contains_key(s)) {
        score -= 1.0;
    }
    if item
        .subjects
        .iter()
        .all(|s| counts.get(s).copied().unwrap_or(0) >= 2)
    {
        score += 1.0;
    }
    score
}

pub fn freshness(item: &Item, turn_index: usize, history: &[Slot]) -> f64 {
    if turn_index == 0 || !history[turn_index - 1].is_pause() {
        return 0.0;
    }
    let pause_at = turn_index - 1;
    let start = pause_at.saturating_sub(FRESHNESS_WINDOW);
    let seen: HashSet<Subject> = history[start..pause_at]
        .iter()
        .filter_map(Slot::item)
        .flat_map(|prev| prev.subjects.iter().copied())
        .collect();
    item.subjects.iter().filter(|s| !seen.contains(s)).count() as f64
}

pub fn nonmonotony(item: &Item, turn_index: usize, history: &[Slot]) -> f64 {
    if turn_index < MONOTONY_WINDOW {
        return 0.0;
    }
    let streak = history[turn_index - MONOTONY_WINDOW..turn_index]
        .iter()
        .all(|slot| slot.item().is_some_and(|prev| prev.shares_subject_with(item)));
    if streak {
        -1.0
    } else {
        0.0
    }
}

/// Mean of `1 - rank/len` over the item's subjects. A subject missing from
/// `preferences` counts as 0.
pub fn individual_bonus(item: &Item, preferences: &[Subject]) -> f64 {
    if preferences.is_empty() || item.subjects.is_empty() {
        return 0.0;
    }
    let len = preferences.len() as f64;
    let sum = item
        .subjects
        .iter()
        .filter_map(|s| preferences.iter().position(|p| p == s))
        .map(|rank| 1.0 - rank as f64 / len)
        .sum::<f64>();
    sum / item.subjects.len() as f64
}
