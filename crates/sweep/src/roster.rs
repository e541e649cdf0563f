use crate::SweepError;
use parley_core::AgentKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered archetype counts, e.g. `adaptive:1,greedy:2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSpec {
    pub entries: Vec<(AgentKind, usize)>,
}

impl RosterSpec {
    /// Accepts `kind:count` pairs separated by commas; a bare `kind` counts once.
    pub fn parse(text: &str) -> Result<Self, SweepError> {
        let mut entries: Vec<(AgentKind, usize)> = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, count) = match part.split_once(':') {
                Some((name, count)) => {
                    let count = count.trim().parse::<usize>().map_err(|_| {
                        SweepError::Config(format!("invalid count in roster entry: {part}"))
                    })?;
                    (name, count)
                }
                None => (part, 1),
            };
            let kind = name.parse::<AgentKind>()?;
            if count == 0 {
                continue;
            }
            match entries.iter_mut().find(|(existing, _)| *existing == kind) {
                Some((_, total)) => *total += count,
                None => entries.push((kind, count)),
            }
        }
        if entries.is_empty() {
            return Err(SweepError::Config(format!("roster has no participants: {text}")));
        }
        Ok(Self { entries })
    }

    /// One archetype per seat, in roster order.
    pub fn seats(&self) -> Vec<AgentKind> {
        self.entries
            .iter()
            .flat_map(|(kind, count)| std::iter::repeat(*kind).take(*count))
            .collect()
    }

    pub fn participants(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn count_of(&self, kind: AgentKind) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn label(&self) -> String {
        self.entries
            .iter()
            .map(|(kind, count)| format!("{}:{}", kind.id(), count))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for RosterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for RosterSpec {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts_and_aliases() {
        let roster = RosterSpec::parse("p10:1, greedy:2,pr").expect("roster");
        assert_eq!(
            roster.entries,
            vec![
                (AgentKind::Adaptive, 1),
                (AgentKind::Greedy, 2),
                (AgentKind::Random, 1)
            ]
        );
        assert_eq!(roster.participants(), 4);
        assert_eq!(roster.label(), "adaptive:1,greedy:2,random:1");
        assert_eq!(
            roster.seats(),
            vec![
                AgentKind::Adaptive,
                AgentKind::Greedy,
                AgentKind::Greedy,
                AgentKind::Random
            ]
        );
    }

    #[test]
    fn merges_repeated_kinds_and_drops_zero() {
        let roster = RosterSpec::parse("adaptive:1,pause:0,adaptive:2").expect("roster");
        assert_eq!(roster.entries, vec![(AgentKind::Adaptive, 3)]);
        assert_eq!(roster.count_of(AgentKind::Adaptive), 3);
        assert_eq!(roster.count_of(AgentKind::Pause), 0);
    }

    #[test]
    fn rejects_bad_input() {
        for text in ["", "wizard:2", "adaptive:x", "adaptive:-1", "pause:0"] {
            let err = RosterSpec::parse(text).expect_err(text);
            assert!(err.is_config(), "{text}: {err}");
        }
    }
}
