//! Allow/deny rules attached to libraries and arguments
//! in version JSON files.
//!
//! ```json
//! "rules": [
//!     { "action": "allow" },
//!     { "action": "disallow", "os": { "name": "osx" } }
//! ]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    #[serde(alias = "deny")]
    Disallow,
}

impl RuleAction {
    #[must_use]
    pub fn is_allow(self) -> bool {
        self == RuleAction::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<RuleOs>,
    /// Launcher feature flags (`is_demo_user`, `has_custom_resolution`, ...).
    /// Kept for round-tripping, not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// OS version regex. Kept for round-tripping, not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl RuleOs {
    /// Whether this predicate names an OS or an architecture at all.
    #[must_use]
    pub fn is_specific(&self) -> bool {
        self.name.is_some() || self.arch.is_some()
    }

    #[must_use]
    pub fn matches(&self, platform: Platform) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|name| platform.os.matches(name));
        let arch_ok = self
            .arch
            .as_deref()
            .is_none_or(|arch| platform.arch.matches(arch));
        name_ok && arch_ok
    }
}

impl Rule {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
            features: None,
        }
    }

    #[must_use]
    pub fn disallow() -> Self {
        Self {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }
    }

    #[must_use]
    pub fn on_os(mut self, name: &str) -> Self {
        self.os.get_or_insert_with(RuleOs::default).name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn on_arch(mut self, arch: &str) -> Self {
        self.os.get_or_insert_with(RuleOs::default).arch = Some(arch.to_owned());
        self
    }

    fn os_predicate(&self) -> Option<&RuleOs> {
        self.os.as_ref().filter(|os| os.is_specific())
    }
}

/// Decides whether an entry guarded by `rules` applies on `platform`.
///
/// - No rules: always applies.
/// - The last rule whose OS predicate matches `platform` decides,
///   overriding any unconditional rule.
/// - Otherwise the last unconditional rule decides.
/// - Otherwise (only OS-specific rules, none matching): doesn't apply.
#[must_use]
pub fn applies(rules: &[Rule], platform: Platform) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut os_specific = None;
    let mut unconditional = None;

    for rule in rules {
        match rule.os_predicate() {
            Some(os) if os.matches(platform) => os_specific = Some(rule.action),
            Some(_) => {}
            None => unconditional = Some(rule.action),
        }
    }

    os_specific
        .or(unconditional)
        .is_some_and(RuleAction::is_allow)
}
