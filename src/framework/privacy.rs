// Privacy policy - single authorization layer keyed by (actor, action, target)
// Rules are evaluated by priority; the first Allow/Deny wins and the default is deny.

use once_cell::sync::Lazy;

use crate::error::{AppError, AppResult, DomainRule};

/// What the actor is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Edit,
    Delete,
    /// Create children owned through the target (venues, events, images, posts).
    Manage,
    Join,
    /// Remove `member_id` from the target; self-leave when it is the actor.
    Leave { member_id: i64 },
    Attend,
}

/// The entity being acted on, reduced to the ids that decide ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    User { id: i64 },
    Post { creator: i64 },
    Comment { author: i64 },
    Group { organizer: i64 },
    Event { organizer: i64 },
}

impl Target {
    fn owner(&self) -> i64 {
        match *self {
            Target::User { id } => id,
            Target::Post { creator } => creator,
            Target::Comment { author } => author,
            Target::Group { organizer } | Target::Event { organizer } => organizer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyContext {
    pub actor: i64,
    pub action: Action,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Forbidden,
    Rule(DomainRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyResult {
    Allow,
    Deny(Denial),
    Skip,
}

pub trait PolicyRule: Send + Sync {
    fn evaluate(&self, ctx: &PolicyContext) -> PolicyResult;

    fn name(&self) -> &str;

    /// Higher is evaluated first.
    fn priority(&self) -> i32;
}

#[derive(Default)]
pub struct PolicyRegistry {
    rules: Vec<Box<dyn PolicyRule>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_rule(&mut self, rule: Box<dyn PolicyRule>) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn evaluate(&self, ctx: &PolicyContext) -> PolicyResult {
        for rule in &self.rules {
            match rule.evaluate(ctx) {
                PolicyResult::Skip => continue,
                decision => {
                    tracing::debug!(rule = rule.name(), ?ctx, ?decision, "Policy decision");
                    return decision;
                }
            }
        }
        PolicyResult::Deny(Denial::Forbidden)
    }

    pub fn check(&self, ctx: &PolicyContext) -> AppResult<()> {
        match self.evaluate(ctx) {
            PolicyResult::Allow => Ok(()),
            PolicyResult::Deny(Denial::Rule(rule)) => Err(AppError::Rule(rule)),
            PolicyResult::Deny(Denial::Forbidden) | PolicyResult::Skip => Err(AppError::forbidden()),
        }
    }
}

/// Only the owner may edit, delete or manage what they own.
pub struct OwnerOnlyRule;

impl PolicyRule for OwnerOnlyRule {
    fn evaluate(&self, ctx: &PolicyContext) -> PolicyResult {
        match ctx.action {
            Action::Edit | Action::Delete | Action::Manage => {
                if ctx.actor == ctx.target.owner() {
                    PolicyResult::Allow
                } else {
                    PolicyResult::Deny(Denial::Forbidden)
                }
            }
            _ => PolicyResult::Skip,
        }
    }

    fn name(&self) -> &str {
        "owner_only"
    }

    fn priority(&self) -> i32 {
        200
    }
}

/// Group membership: the organizer participates implicitly and can never be a member row.
pub struct MembershipRule;

impl PolicyRule for MembershipRule {
    fn evaluate(&self, ctx: &PolicyContext) -> PolicyResult {
        let Target::Group { organizer } = ctx.target else {
            return PolicyResult::Skip;
        };
        match ctx.action {
            Action::Join if ctx.actor == organizer => {
                PolicyResult::Deny(Denial::Rule(DomainRule::IsOrganizer))
            }
            Action::Join => PolicyResult::Allow,
            Action::Leave { member_id } => leave_decision(ctx.actor, member_id, organizer),
            _ => PolicyResult::Skip,
        }
    }

    fn name(&self) -> &str {
        "membership"
    }

    fn priority(&self) -> i32 {
        300
    }
}

/// Event attendance: the group's organizer is implicitly attending.
pub struct AttendanceRule;

impl PolicyRule for AttendanceRule {
    fn evaluate(&self, ctx: &PolicyContext) -> PolicyResult {
        let Target::Event { organizer } = ctx.target else {
            return PolicyResult::Skip;
        };
        match ctx.action {
            Action::Attend if ctx.actor == organizer => {
                PolicyResult::Deny(Denial::Rule(DomainRule::OrganizerAttending))
            }
            Action::Attend => PolicyResult::Allow,
            Action::Leave { member_id } => leave_decision(ctx.actor, member_id, organizer),
            _ => PolicyResult::Skip,
        }
    }

    fn name(&self) -> &str {
        "attendance"
    }

    fn priority(&self) -> i32 {
        300
    }
}

fn leave_decision(actor: i64, member_id: i64, organizer: i64) -> PolicyResult {
    if member_id == actor {
        if actor == organizer {
            PolicyResult::Deny(Denial::Rule(DomainRule::OrganizerCannotLeave))
        } else {
            PolicyResult::Allow
        }
    } else if member_id == organizer {
        PolicyResult::Deny(Denial::Rule(DomainRule::OrganizerCannotBeRemoved))
    } else if actor == organizer {
        PolicyResult::Allow
    } else {
        PolicyResult::Deny(Denial::Forbidden)
    }
}

pub fn create_default_policy_registry() -> PolicyRegistry {
    let mut registry = PolicyRegistry::new();
    registry.register_rule(Box::new(MembershipRule));
    registry.register_rule(Box::new(AttendanceRule));
    registry.register_rule(Box::new(OwnerOnlyRule));
    registry
}

static POLICY: Lazy<PolicyRegistry> = Lazy::new(create_default_policy_registry);

/// Authorize `actor` to perform `action` on `target`.
pub fn authorize(actor: i64, action: Action, target: Target) -> AppResult<()> {
    POLICY.check(&PolicyContext {
        actor,
        action,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORGANIZER: i64 = 1;
    const MEMBER: i64 = 2;
    const OTHER: i64 = 3;

    fn group() -> Target {
        Target::Group {
            organizer: ORGANIZER,
        }
    }

    fn event() -> Target {
        Target::Event {
            organizer: ORGANIZER,
        }
    }

    fn rule_of(result: AppResult<()>) -> Option<DomainRule> {
        match result {
            Err(AppError::Rule(rule)) => Some(rule),
            _ => None,
        }
    }

    #[test]
    fn owners_edit_and_delete_their_content() {
        assert!(authorize(5, Action::Edit, Target::Post { creator: 5 }).is_ok());
        assert!(authorize(5, Action::Delete, Target::Comment { author: 5 }).is_ok());
        assert!(authorize(5, Action::Manage, Target::Group { organizer: 5 }).is_ok());
        assert!(matches!(
            authorize(6, Action::Delete, Target::Post { creator: 5 }),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(6, Action::Edit, Target::User { id: 5 }),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn organizer_cannot_join_own_group() {
        assert_eq!(
            rule_of(authorize(ORGANIZER, Action::Join, group())),
            Some(DomainRule::IsOrganizer)
        );
        assert!(authorize(MEMBER, Action::Join, group()).is_ok());
    }

    #[test]
    fn leaving_and_removal() {
        // self-leave
        assert!(authorize(MEMBER, Action::Leave { member_id: MEMBER }, group()).is_ok());
        assert_eq!(
            rule_of(authorize(
                ORGANIZER,
                Action::Leave {
                    member_id: ORGANIZER
                },
                group()
            )),
            Some(DomainRule::OrganizerCannotLeave)
        );
        // removal by organizer
        assert!(authorize(ORGANIZER, Action::Leave { member_id: MEMBER }, group()).is_ok());
        // removal by someone else
        assert!(matches!(
            authorize(OTHER, Action::Leave { member_id: MEMBER }, group()),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            rule_of(authorize(
                MEMBER,
                Action::Leave {
                    member_id: ORGANIZER
                },
                group()
            )),
            Some(DomainRule::OrganizerCannotBeRemoved)
        );
    }

    #[test]
    fn organizer_is_implicitly_attending() {
        assert_eq!(
            rule_of(authorize(ORGANIZER, Action::Attend, event())),
            Some(DomainRule::OrganizerAttending)
        );
        assert!(authorize(MEMBER, Action::Attend, event()).is_ok());
        assert_eq!(
            rule_of(authorize(
                ORGANIZER,
                Action::Leave {
                    member_id: ORGANIZER
                },
                event()
            )),
            Some(DomainRule::OrganizerCannotLeave)
        );
    }

    #[test]
    fn unmatched_requests_are_denied() {
        let registry = PolicyRegistry::new();
        let ctx = PolicyContext {
            actor: 1,
            action: Action::Join,
            target: Target::Post { creator: 1 },
        };
        assert_eq!(registry.evaluate(&ctx), PolicyResult::Deny(Denial::Forbidden));
        // joining a post is not a thing
        assert!(authorize(1, Action::Join, Target::Post { creator: 2 }).is_err());
    }
}
