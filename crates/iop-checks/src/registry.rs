//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Static catalogue of suites and their checks."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt;

use crate::error::{CheckResult, SessionError};
use crate::session::Session;
use crate::suites;

/// Deployments a check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope {
    Any,
    /// Only meaningful with a rootless service account.
    RootlessOnly,
}

/// A single named assertion against the deployment.
#[derive(Clone, Copy)]
pub struct Check {
    pub name: &'static str,
    pub description: &'static str,
    pub scope: CheckScope,
    pub run: fn(&Session) -> CheckResult,
}

impl Check {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        run: fn(&Session) -> CheckResult,
    ) -> Self {
        Self {
            name,
            description,
            scope: CheckScope::Any,
            run,
        }
    }

    pub const fn rootless(
        name: &'static str,
        description: &'static str,
        run: fn(&Session) -> CheckResult,
    ) -> Self {
        Self {
            name,
            description,
            scope: CheckScope::RootlessOnly,
            run,
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Checks for one platform subsystem.
#[derive(Debug, Clone, Copy)]
pub struct Suite {
    pub name: &'static str,
    pub description: &'static str,
    pub checks: &'static [Check],
}

impl Suite {
    pub fn check(&self, name: &str) -> Option<&'static Check> {
        self.checks.iter().find(|check| check.name == name)
    }
}

static SUITES: [Suite; 12] = [
    suites::kafka::SUITE,
    suites::engine::SUITE,
    suites::ingress::SUITE,
    suites::gateway::SUITE,
    suites::inventory::SUITE,
    suites::puptoo::SUITE,
    suites::yuptoo::SUITE,
    suites::vmaas::SUITE,
    suites::remediation::SUITE,
    suites::integration::SUITE,
    suites::network::SUITE,
    suites::network_role::SUITE,
];

/// Every suite, in run order.
pub fn registry() -> &'static [Suite] {
    &SUITES
}

pub fn find_suite(name: &str) -> Option<&'static Suite> {
    SUITES.iter().find(|suite| suite.name == name)
}

/// Suites named in `names`, in registry order; all suites when empty.
pub fn select_suites(names: &[String]) -> Result<Vec<&'static Suite>, SessionError> {
    if let Some(unknown) = names.iter().find(|name| find_suite(name).is_none()) {
        return Err(SessionError::UnknownSuite(unknown.clone()));
    }
    Ok(SUITES
        .iter()
        .filter(|suite| names.is_empty() || names.iter().any(|name| name == suite.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn names_are_unique() {
        let suites: BTreeSet<_> = registry().iter().map(|suite| suite.name).collect();
        assert_eq!(suites.len(), registry().len());
        for suite in registry() {
            let checks: BTreeSet<_> = suite.checks.iter().map(|check| check.name).collect();
            assert_eq!(checks.len(), suite.checks.len(), "duplicate check in {}", suite.name);
            assert!(!suite.checks.is_empty());
        }
    }

    #[test]
    fn selection_keeps_registry_order_and_rejects_unknown() {
        let picked = select_suites(&["network".into(), "kafka".into()]).unwrap();
        let names: Vec<_> = picked.iter().map(|suite| suite.name).collect();
        assert_eq!(names, vec!["kafka", "network"]);
        assert!(matches!(
            select_suites(&["satellite".into()]),
            Err(SessionError::UnknownSuite(name)) if name == "satellite"
        ));
        assert_eq!(select_suites(&[]).unwrap().len(), 12);
    }

    #[test]
    fn network_role_checks_are_rootless_only() {
        let suite = find_suite("network_role").unwrap();
        assert!(suite
            .checks
            .iter()
            .all(|check| check.scope == CheckScope::RootlessOnly));
        assert_eq!(
            find_suite("network").unwrap().check("netavark_installed").unwrap().scope,
            CheckScope::Any
        );
    }
}
