//! Wildcarding strategies.
//!
//! A strategy decides which of the analyzer's candidate positions actually
//! become `??` in a variant. All nine run for every target; dedup and
//! ranking pick the survivors.

use crate::types::{ReasonCode, WildcardRules};

/// The nine wildcarding strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Relative jumps and calls only.
    Minimal,
    /// The caller's configured rule set (the default behavior).
    Conservative,
    /// Conservative plus struct offsets.
    Balanced,
    /// Every candidate position.
    Aggressive,
    /// Stack offsets only.
    StackFocus,
    /// Global absolute addresses only.
    GlobalFocus,
    /// All memory displacements.
    MemoryHeavy,
    /// Every candidate plus trailing immediates.
    MaxStability,
    /// Immediate values only.
    ImmediatesOnly,
}

impl Strategy {
    /// All strategies in ranking-stable order.
    pub const ALL: [Strategy; 9] = [
        Strategy::Minimal,
        Strategy::Conservative,
        Strategy::Balanced,
        Strategy::Aggressive,
        Strategy::StackFocus,
        Strategy::GlobalFocus,
        Strategy::MemoryHeavy,
        Strategy::MaxStability,
        Strategy::ImmediatesOnly,
    ];

    /// The strategy's tag string, recorded on every variant.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Minimal => "minimal",
            Strategy::Conservative => "conservative",
            Strategy::Balanced => "balanced",
            Strategy::Aggressive => "aggressive",
            Strategy::StackFocus => "stack_focus",
            Strategy::GlobalFocus => "global_focus",
            Strategy::MemoryHeavy => "memory_heavy",
            Strategy::MaxStability => "max_stability",
            Strategy::ImmediatesOnly => "immediates_only",
        }
    }

    /// Does this strategy realize a candidate of the given class?
    pub fn realizes(&self, class: ReasonCode, rules: WildcardRules) -> bool {
        match self {
            Strategy::Minimal => matches!(
                class,
                ReasonCode::RelativeJump | ReasonCode::RelativeCall
            ),
            Strategy::Conservative => rules.admits(class),
            Strategy::Balanced => rules.admits(class) || class == ReasonCode::StructOffset,
            Strategy::Aggressive | Strategy::MaxStability => true,
            Strategy::StackFocus => class == ReasonCode::StackOffset,
            Strategy::GlobalFocus => class == ReasonCode::GlobalAddress,
            Strategy::MemoryHeavy => class.is_memory(),
            Strategy::ImmediatesOnly => class == ReasonCode::Immediate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_takes_only_relatives() {
        let rules = WildcardRules::default();
        assert!(Strategy::Minimal.realizes(ReasonCode::RelativeJump, rules));
        assert!(Strategy::Minimal.realizes(ReasonCode::RelativeCall, rules));
        assert!(!Strategy::Minimal.realizes(ReasonCode::StackOffset, rules));
        assert!(!Strategy::Minimal.realizes(ReasonCode::Immediate, rules));
    }

    #[test]
    fn test_conservative_follows_rules() {
        let rules = WildcardRules::RELATIVE_JUMPS | WildcardRules::IMMEDIATES;
        assert!(Strategy::Conservative.realizes(ReasonCode::RelativeJump, rules));
        assert!(Strategy::Conservative.realizes(ReasonCode::Immediate, rules));
        assert!(!Strategy::Conservative.realizes(ReasonCode::StackOffset, rules));
    }

    #[test]
    fn test_balanced_adds_struct_offsets() {
        let rules = WildcardRules::default();
        assert!(!Strategy::Conservative.realizes(ReasonCode::StructOffset, rules));
        assert!(Strategy::Balanced.realizes(ReasonCode::StructOffset, rules));
    }

    #[test]
    fn test_aggressive_takes_everything() {
        let rules = WildcardRules::empty();
        for class in [
            ReasonCode::RelativeJump,
            ReasonCode::RelativeCall,
            ReasonCode::StackOffset,
            ReasonCode::GlobalAddress,
            ReasonCode::Immediate,
            ReasonCode::StructOffset,
            ReasonCode::MemoryDisplacement,
        ] {
            assert!(Strategy::Aggressive.realizes(class, rules));
            assert!(Strategy::MaxStability.realizes(class, rules));
        }
    }

    #[test]
    fn test_focus_strategies() {
        let rules = WildcardRules::default();
        assert!(Strategy::StackFocus.realizes(ReasonCode::StackOffset, rules));
        assert!(!Strategy::StackFocus.realizes(ReasonCode::GlobalAddress, rules));
        assert!(Strategy::GlobalFocus.realizes(ReasonCode::GlobalAddress, rules));
        assert!(Strategy::MemoryHeavy.realizes(ReasonCode::StructOffset, rules));
        assert!(Strategy::MemoryHeavy.realizes(ReasonCode::StackOffset, rules));
        assert!(!Strategy::MemoryHeavy.realizes(ReasonCode::RelativeJump, rules));
        assert!(Strategy::ImmediatesOnly.realizes(ReasonCode::Immediate, rules));
        assert!(!Strategy::ImmediatesOnly.realizes(ReasonCode::RelativeJump, rules));
    }
}
