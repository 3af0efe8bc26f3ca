//! Table-driven state machines
//!
//! Each status enum supplies one static [`TransitionTable`]; the walking logic
//! lives here once. A status with no outgoing row is terminal.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use lendledger_core::{LedgerError, LedgerResult};

use crate::entity::EntityType;

/// A status governed by a transition table
pub trait Status: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn table() -> &'static TransitionTable<Self>;
}

/// `(entity type, from status) -> allowed target statuses`
#[derive(Debug, Clone)]
pub struct TransitionTable<S: Status> {
    entity_type: EntityType,
    rows: HashMap<S, HashSet<S>>,
}

impl<S: Status> TransitionTable<S> {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            rows: HashMap::new(),
        }
    }

    /// Declare the targets reachable from `from`
    pub fn allow(mut self, from: S, targets: &[S]) -> Self {
        self.rows.entry(from).or_default().extend(targets.iter().copied());
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn is_allowed(&self, from: S, to: S) -> bool {
        self.rows.get(&from).map_or(false, |targets| targets.contains(&to))
    }

    pub fn is_terminal(&self, status: S) -> bool {
        self.rows.get(&status).map_or(true, HashSet::is_empty)
    }

    /// Allowed targets from `from`, sorted by display name
    pub fn targets(&self, from: S) -> Vec<S> {
        let mut targets: Vec<S> = self.rows.get(&from).into_iter().flatten().copied().collect();
        targets.sort_by_key(|s| s.to_string());
        targets
    }

    /// Validate a requested move.
    ///
    /// Same-status requests are a caller error, not a silent success.
    pub fn check(&self, from: S, to: S) -> LedgerResult<()> {
        if from == to {
            return Err(LedgerError::Validation(format!(
                "{} is already in status {}",
                self.entity_type, to
            )));
        }
        if !self.is_allowed(from, to) {
            return Err(LedgerError::invalid_transition(
                self.entity_type.to_string(),
                from.to_string(),
                to.to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Amber,
        Broken,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    impl Status for Light {
        fn table() -> &'static TransitionTable<Self> {
            static TABLE: OnceLock<TransitionTable<Light>> = OnceLock::new();
            TABLE.get_or_init(|| {
                TransitionTable::new(EntityType::Cdp)
                    .allow(Light::Red, &[Light::Green, Light::Broken])
                    .allow(Light::Green, &[Light::Amber, Light::Broken])
                    .allow(Light::Amber, &[Light::Red, Light::Broken])
            })
        }
    }

    #[test]
    fn test_allowed_and_terminal() {
        let table = Light::table();
        assert!(table.is_allowed(Light::Red, Light::Green));
        assert!(!table.is_allowed(Light::Red, Light::Amber));
        assert!(table.is_terminal(Light::Broken));
        assert!(!table.is_terminal(Light::Green));
        assert_eq!(table.targets(Light::Red), vec![Light::Broken, Light::Green]);
    }

    #[test]
    fn test_check_categories() {
        let table = Light::table();
        assert!(table.check(Light::Green, Light::Amber).is_ok());
        assert!(matches!(
            table.check(Light::Green, Light::Green),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            table.check(Light::Broken, Light::Red),
            Err(LedgerError::InvalidTransition { .. })
        ));
    }
}
