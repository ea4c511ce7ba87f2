// ─── Rule Evaluation ───
// Allow/disallow conditions attached to libraries and manifest entries.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::platform::HostPlatform;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsConstraint {
    #[serde(default)]
    pub name: Option<String>,
    /// Regular expression matched against the host OS version.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsConstraint>,
}

impl Rule {
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
        }
    }

    pub fn for_os(action: RuleAction, os_name: &str) -> Self {
        Self {
            action,
            os: Some(OsConstraint {
                name: Some(os_name.to_string()),
                ..OsConstraint::default()
            }),
        }
    }

    /// Whether this rule's constraint matches the host.
    pub fn applies_to(&self, host: &HostPlatform) -> bool {
        let Some(os) = &self.os else {
            return true;
        };

        if let Some(name) = &os.name {
            if name != host.os.as_str() {
                return false;
            }
        }

        if let Some(arch) = &os.arch {
            if !arch_matches(arch, host) {
                return false;
            }
        }

        match &os.version {
            None => true,
            Some(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&host.os_version),
                Err(e) => {
                    warn!("Ignoring rule with invalid OS version pattern {pattern:?}: {e}");
                    false
                }
            },
        }
    }
}

fn arch_matches(arch: &str, host: &HostPlatform) -> bool {
    match arch {
        "x86" => !host.arch.is_64_bit() && !host.arch.is_arm(),
        "x86_64" | "amd64" => host.arch.as_str() == "x86_64",
        "arm64" | "aarch64" => host.arch.as_str() == "aarch64",
        other => other == host.arch.as_str(),
    }
}

/// Evaluate a rule list for the host.
///
/// - No rules (absent or empty) → allowed.
/// - Otherwise start disallowed; every matching rule overwrites the outcome,
///   so the last matching rule wins.
pub fn rules_allow(rules: Option<&[Rule]>, host: &HostPlatform) -> bool {
    let rules = match rules {
        Some(r) if !r.is_empty() => r,
        _ => return true,
    };

    let mut allowed = false;
    for rule in rules {
        if rule.applies_to(host) {
            allowed = rule.action == RuleAction::Allow;
        }
    }

    allowed
}
