// ── Reconciliation pass bookkeeping ──
//
// One `Pass` per reconciler call. It owns the state machine and the
// per-pass write budget; both are checked before every store call so a
// reconciler bug surfaces as an error instead of a stray write.

use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::error::CoreError;
use crate::model::EntityRef;
use crate::store::Verb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PassState {
    Planned,
    Created,
    Read,
    Diffed,
    Updated,
    Deleted,
    Missing,
}

impl PassState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted | Self::Missing)
    }

    fn allows(self, next: Self) -> bool {
        use PassState::{Created, Deleted, Diffed, Missing, Planned, Read, Updated};
        if self == Deleted {
            return false;
        }
        matches!(
            (self, next),
            (_, Deleted)
                | (Planned, Created | Read | Missing)
                | (Created | Read | Updated, Read | Missing)
                | (Read, Diffed)
                | (Diffed, Updated)
        )
    }
}

/// At most one create, update and delete call per pass. Reads are free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallBudget {
    creates: u8,
    updates: u8,
    deletes: u8,
}

impl CallBudget {
    fn spend(&mut self, verb: Verb) -> bool {
        let slot = match verb {
            Verb::Create => &mut self.creates,
            Verb::Update => &mut self.updates,
            Verb::Delete => &mut self.deletes,
            Verb::Get | Verb::List | Verb::AddMember | Verb::RemoveMember => return true,
        };
        if *slot > 0 {
            return false;
        }
        *slot += 1;
        true
    }

    pub fn spent(&self, verb: Verb) -> u8 {
        match verb {
            Verb::Create => self.creates,
            Verb::Update => self.updates,
            Verb::Delete => self.deletes,
            Verb::Get | Verb::List | Verb::AddMember | Verb::RemoveMember => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pass {
    entity: EntityRef,
    state: PassState,
    budget: CallBudget,
}

impl Pass {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            state: PassState::Planned,
            budget: CallBudget::default(),
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn budget(&self) -> CallBudget {
        self.budget
    }

    /// Pin the pass to the id the store handed back after a create.
    pub fn identify(&mut self, entity: EntityRef) {
        self.entity = entity;
    }

    /// Move to `next`, or fail if the state machine forbids it.
    pub fn advance(&mut self, next: PassState, action: &'static str) -> Result<(), CoreError> {
        if !self.state.allows(next) {
            return Err(CoreError::InvalidTransition {
                entity: self.entity.clone(),
                from: self.state,
                action,
            });
        }
        debug!(entity = %self.entity, from = %self.state, to = %next, "pass transition");
        self.state = next;
        Ok(())
    }

    /// Reserve one call of `verb` against the write budget.
    pub fn charge(&mut self, verb: Verb) -> Result<(), CoreError> {
        if self.budget.spend(verb) {
            Ok(())
        } else {
            Err(CoreError::CallBudgetExceeded {
                entity: self.entity.clone(),
                verb,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn pass() -> Pass {
        Pass::new(EntityRef::new(EntityKind::Stack, None))
    }

    #[test]
    fn create_then_confirm_read() {
        let mut p = pass();
        p.advance(PassState::Created, "create").unwrap();
        p.advance(PassState::Read, "refresh").unwrap();
        assert_eq!(p.state(), PassState::Read);
    }

    #[test]
    fn update_requires_a_diff_first() {
        let mut p = pass();
        p.advance(PassState::Read, "import").unwrap();
        let err = p.advance(PassState::Updated, "update").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: PassState::Read,
                action: "update",
                ..
            }
        ));
        p.advance(PassState::Diffed, "diff").unwrap();
        p.advance(PassState::Updated, "update").unwrap();
        p.advance(PassState::Read, "refresh").unwrap();
    }

    #[test]
    fn delete_is_reachable_from_any_live_state() {
        for start in [
            PassState::Planned,
            PassState::Created,
            PassState::Read,
            PassState::Diffed,
            PassState::Updated,
            PassState::Missing,
        ] {
            assert!(start.allows(PassState::Deleted), "{start}");
        }
        assert!(!PassState::Deleted.allows(PassState::Deleted));
    }

    #[test]
    fn missing_is_terminal_for_everything_but_delete() {
        assert!(PassState::Missing.is_terminal());
        assert!(!PassState::Missing.allows(PassState::Read));
        assert!(!PassState::Missing.allows(PassState::Created));
    }

    #[test]
    fn budget_allows_one_write_of_each_kind() {
        let mut p = pass();
        p.charge(Verb::Create).unwrap();
        p.charge(Verb::Update).unwrap();
        p.charge(Verb::Delete).unwrap();
        p.charge(Verb::Get).unwrap();
        p.charge(Verb::Get).unwrap();
        let err = p.charge(Verb::Update).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CallBudgetExceeded {
                verb: Verb::Update,
                ..
            }
        ));
        assert_eq!(p.budget().spent(Verb::Update), 1);
    }
}
