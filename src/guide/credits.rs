use std::collections::BTreeMap;

use crate::models::CastItem;
use crate::xmltv::{Credit, CreditRole};

/// How many people of each role make it into a programme's credits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditQuota {
    limits: BTreeMap<CreditRole, usize>,
}

impl Default for CreditQuota {
    fn default() -> Self {
        let limits = CreditRole::ALL
            .into_iter()
            .map(|role| {
                let limit = match role {
                    CreditRole::Actor => 15,
                    CreditRole::Presenter | CreditRole::Guest => 3,
                    CreditRole::Commentator => 2,
                    _ => 1,
                };
                (role, limit)
            })
            .collect();
        Self { limits }
    }
}

impl CreditQuota {
    pub fn with(mut self, role: CreditRole, limit: usize) -> Self {
        self.limits.insert(role, limit);
        self
    }

    pub fn limit(&self, role: CreditRole) -> usize {
        self.limits.get(&role).copied().unwrap_or(0)
    }

    /// Pick credits in cast order until each role's quota is used up
    ///
    /// Unknown role types are dropped. The result is grouped by role in
    /// document order and keeps cast order within a role.
    pub fn allocate(&self, items: &[CastItem]) -> Vec<Credit> {
        let mut remaining = self.limits.clone();
        let mut grouped: BTreeMap<CreditRole, Vec<Credit>> = BTreeMap::new();

        for item in items {
            let Some(role) = CreditRole::from_kind(&item.kind) else {
                continue;
            };
            let Some(left) = remaining.get_mut(&role).filter(|left| **left > 0) else {
                continue;
            };
            *left -= 1;

            let character = match role {
                CreditRole::Actor => item.role.clone().filter(|r| !r.is_empty()),
                _ => None,
            };
            grouped.entry(role).or_default().push(Credit {
                role,
                name: item.name.clone(),
                character,
            });
        }

        grouped.into_values().flatten().collect()
    }
}
