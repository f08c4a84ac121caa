//! Checkpoint strategies and the decision function

use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use store::Trigger;

/// Policy deciding which session events create an automatic checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStrategy {
    /// Only explicit user requests
    Manual,
    /// One checkpoint per prompt submission
    PerPrompt,
    /// One checkpoint per tool invocation
    PerToolUse,
    /// Prompts and state-mutating tool calls
    #[default]
    Smart,
}

impl CheckpointStrategy {
    /// All strategies, in display order
    pub const ALL: [CheckpointStrategy; 4] = [
        Self::Manual,
        Self::PerPrompt,
        Self::PerToolUse,
        Self::Smart,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::PerPrompt => "per_prompt",
            Self::PerToolUse => "per_tool_use",
            Self::Smart => "smart",
        }
    }
}

impl fmt::Display for CheckpointStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| EngineError::InvalidStrategy(s.to_string()))
    }
}

/// Event emitted by a running session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The user submitted a prompt
    PromptSubmitted,
    /// The agent invoked a tool; the caller classifies whether it mutates state
    ToolInvoked { tool_name: String, is_mutating: bool },
    /// The user explicitly asked for a checkpoint
    ManualRequest,
}

impl SessionEvent {
    /// Shorthand for a tool invocation event
    pub fn tool(tool_name: impl Into<String>, is_mutating: bool) -> Self {
        Self::ToolInvoked {
            tool_name: tool_name.into(),
            is_mutating,
        }
    }

    /// True for explicit user requests
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::ManualRequest)
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PromptSubmitted => "prompt_submitted",
            Self::ToolInvoked { .. } => "tool_invoked",
            Self::ManualRequest => "manual_request",
        }
    }
}

/// Decide whether an event creates a checkpoint
///
/// Pure and total. Manual requests always checkpoint, regardless of the
/// strategy or the master switch.
pub fn decide(strategy: CheckpointStrategy, auto_enabled: bool, event: &SessionEvent) -> bool {
    match event {
        SessionEvent::ManualRequest => true,
        _ if !auto_enabled => false,
        SessionEvent::PromptSubmitted => matches!(
            strategy,
            CheckpointStrategy::PerPrompt | CheckpointStrategy::Smart
        ),
        SessionEvent::ToolInvoked { is_mutating, .. } => match strategy {
            CheckpointStrategy::Manual | CheckpointStrategy::PerPrompt => false,
            CheckpointStrategy::PerToolUse => true,
            CheckpointStrategy::Smart => *is_mutating,
        },
    }
}

/// Trigger recorded on a checkpoint created for this event
pub fn trigger_for(strategy: CheckpointStrategy, event: &SessionEvent) -> Trigger {
    match (event, strategy) {
        (SessionEvent::ManualRequest, _) => Trigger::Manual,
        (_, CheckpointStrategy::Smart) => Trigger::SmartHeuristic,
        (SessionEvent::PromptSubmitted, _) => Trigger::Prompt,
        (SessionEvent::ToolInvoked { .. }, _) => Trigger::ToolUse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn count(strategy: CheckpointStrategy, enabled: bool, events: &[SessionEvent]) -> usize {
        events.iter().filter(|e| decide(strategy, enabled, e)).count()
    }

    fn random_event(rng: &mut ChaCha8Rng) -> SessionEvent {
        match rng.gen_range(0..3) {
            0 => SessionEvent::PromptSubmitted,
            1 => SessionEvent::tool(format!("tool_{}", rng.gen_range(0..5)), rng.gen()),
            _ => SessionEvent::ManualRequest,
        }
    }

    #[test]
    fn test_per_prompt_scenario() {
        let events = [
            SessionEvent::PromptSubmitted,
            SessionEvent::tool("read_file", false),
            SessionEvent::PromptSubmitted,
        ];
        assert_eq!(count(CheckpointStrategy::PerPrompt, true, &events), 2);
    }

    #[test]
    fn test_smart_skips_read_only_tools() {
        let events = [
            SessionEvent::PromptSubmitted,
            SessionEvent::tool("write_file", true),
            SessionEvent::tool("read_file", false),
        ];
        assert_eq!(count(CheckpointStrategy::Smart, true, &events), 2);
    }

    #[test]
    fn test_per_tool_use_counts_every_tool() {
        let events = [
            SessionEvent::PromptSubmitted,
            SessionEvent::tool("write_file", true),
            SessionEvent::tool("read_file", false),
        ];
        assert_eq!(count(CheckpointStrategy::PerToolUse, true, &events), 2);
    }

    #[test]
    fn test_manual_strategy_ignores_automatic_events() {
        let events = [SessionEvent::PromptSubmitted, SessionEvent::tool("write_file", true)];
        assert_eq!(count(CheckpointStrategy::Manual, true, &events), 0);
        assert!(decide(CheckpointStrategy::Manual, true, &SessionEvent::ManualRequest));
    }

    #[test]
    fn test_disabled_only_allows_manual_requests() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let event = random_event(&mut rng);
            for strategy in CheckpointStrategy::ALL {
                assert_eq!(decide(strategy, false, &event), event.is_manual());
            }
        }
    }

    #[test]
    fn test_decide_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let events: Vec<_> = (0..200).map(|_| random_event(&mut rng)).collect();

        for strategy in CheckpointStrategy::ALL {
            for enabled in [true, false] {
                let forward: Vec<_> = events.iter().map(|e| decide(strategy, enabled, e)).collect();
                let mut backward: Vec<_> =
                    events.iter().rev().map(|e| decide(strategy, enabled, e)).collect();
                backward.reverse();
                assert_eq!(forward, backward);
            }
        }
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("per_tool_use".parse::<CheckpointStrategy>().unwrap(), CheckpointStrategy::PerToolUse);
        for strategy in CheckpointStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<CheckpointStrategy>().unwrap(), strategy);
        }

        let err = "aggressive".parse::<CheckpointStrategy>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidStrategy(ref s) if s == "aggressive"));
        assert!("Smart".parse::<CheckpointStrategy>().is_err());
    }

    #[test]
    fn test_trigger_labels() {
        let prompt = SessionEvent::PromptSubmitted;
        let tool = SessionEvent::tool("bash", true);

        assert_eq!(trigger_for(CheckpointStrategy::PerPrompt, &prompt), Trigger::Prompt);
        assert_eq!(trigger_for(CheckpointStrategy::PerToolUse, &tool), Trigger::ToolUse);
        assert_eq!(trigger_for(CheckpointStrategy::Smart, &tool), Trigger::SmartHeuristic);
        assert_eq!(trigger_for(CheckpointStrategy::Smart, &SessionEvent::ManualRequest), Trigger::Manual);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(SessionEvent::tool("write_file", true)).unwrap();
        assert_eq!(json["type"], "tool_invoked");
        assert_eq!(json["tool_name"], "write_file");

        let parsed: SessionEvent = serde_json::from_str(r#"{"type":"prompt_submitted"}"#).unwrap();
        assert_eq!(parsed, SessionEvent::PromptSubmitted);
    }
}
