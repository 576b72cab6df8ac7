use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorBuilder, MemoryError};

/// The five scopes an entry or query can live under, narrowest last in the
/// natural reading order but ordered narrowest-first for scope-chain walks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Session,
    Agent,
    Project,
    Organization,
    #[default]
    Global,
}

impl ScopeType {
    /// Ordered narrowest-to-broadest.
    pub const ORDER: [ScopeType; 5] = [
        ScopeType::Session,
        ScopeType::Agent,
        ScopeType::Project,
        ScopeType::Organization,
        ScopeType::Global,
    ];

    pub fn rank(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).unwrap()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Agent => "agent",
            Self::Project => "project",
            Self::Organization => "organization",
            Self::Global => "global",
        }
    }
}

/// A concrete scope: `scope_id` is `None` iff `scope_type == Global`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub scope_type: ScopeType,
    pub scope_id: Option<Uuid>,
}

impl Scope {
    pub fn global() -> Self {
        Self {
            scope_type: ScopeType::Global,
            scope_id: None,
        }
    }

    pub fn new(scope_type: ScopeType, scope_id: Option<Uuid>) -> Result<Self, MemoryError> {
        match (scope_type, scope_id) {
            (ScopeType::Global, None) => Ok(Self { scope_type, scope_id: None }),
            (ScopeType::Global, Some(_)) => Err(ErrorBuilder::new(
                "global scope must not carry a scope_id",
            )
            .field("scope_id")
            .validation()),
            (_, None) => Err(ErrorBuilder::new(format!(
                "{} scope requires a scope_id",
                scope_type.as_str()
            ))
            .field("scope_id")
            .validation()),
            (_, Some(id)) => Ok(Self { scope_type, scope_id: Some(id) }),
        }
    }

    /// Is `other` narrower-than-or-equal-to `self` in the inheritance sense
    /// (i.e. would `self` ever see `other` while walking its scope chain)?
    pub fn covers(self, other: Scope) -> bool {
        other.scope_type.rank() >= self.scope_type.rank()
    }
}

/// The narrowest-to-broadest list of scopes considered by a query when
/// `inherit=true`. Always contains `requested` at index 0.
#[derive(Debug, Clone)]
pub struct ScopeChain {
    pub requested: Scope,
    pub chain: Vec<Scope>,
}

impl ScopeChain {
    /// Build a scope chain from the requested scope upward.
    ///
    /// `resolve_parent` maps a non-global scope to its immediate broader
    /// scope (e.g. session → its agent, agent → its project, project → its
    /// organization, organization → global). It is supplied by the storage
    /// layer since the parent linkage is data, not policy.
    pub fn build(
        requested: Scope,
        inherit: bool,
        mut resolve_parent: impl FnMut(Scope) -> Option<Scope>,
    ) -> Self {
        let mut chain = vec![requested];
        if inherit {
            let mut current = requested;
            while let Some(parent) = resolve_parent(current) {
                chain.push(parent);
                current = parent;
            }
            if current.scope_type != ScopeType::Global {
                chain.push(Scope::global());
            }
        }
        Self { requested, chain }
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.chain.contains(&scope)
    }
}

/// One of the four versioned entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Tool,
    Guideline,
    Knowledge,
    Experience,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Tool,
        EntryKind::Guideline,
        EntryKind::Knowledge,
        EntryKind::Experience,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Guideline => "guideline",
            Self::Knowledge => "knowledge",
            Self::Experience => "experience",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_scope_requires_no_id() {
        assert!(Scope::new(ScopeType::Global, Some(Uuid::new_v4())).is_err());
        assert!(Scope::new(ScopeType::Global, None).is_ok());
    }

    #[test]
    fn non_global_scope_requires_id() {
        assert!(Scope::new(ScopeType::Project, None).is_err());
        assert!(Scope::new(ScopeType::Project, Some(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn scope_chain_walks_to_global() {
        let project_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let project = Scope::new(ScopeType::Project, Some(project_id)).unwrap();
        let org = Scope::new(ScopeType::Organization, Some(org_id)).unwrap();
        let chain = ScopeChain::build(project, true, move |s| {
            if s.scope_type == ScopeType::Project {
                Some(org)
            } else {
                None
            }
        });
        assert_eq!(chain.chain, vec![project, org, Scope::global()]);
    }

    #[test]
    fn no_inherit_chain_is_singleton() {
        let scope = Scope::global();
        let chain = ScopeChain::build(scope, false, |_| None);
        assert_eq!(chain.chain.len(), 1);
    }
}
