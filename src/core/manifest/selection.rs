use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::model::ModRef;
use crate::core::error::{EngineError, EngineResult};
use crate::core::session::Side;

/// Decide which mods get installed.
///
/// `choices` lists the optional mods the user picked; `None` means "use the
/// pack defaults". Required mods are always in. Dependencies are pulled in
/// transitively, linked mods follow their parent, and a group may contribute
/// at most one mod. The result keeps manifest order.
pub fn select_mods(mods: &[ModRef], side: Side, choices: Option<&[String]>) -> EngineResult<Vec<ModRef>> {
    let known: HashSet<&str> = mods.iter().map(|m| m.name.as_str()).collect();
    let applicable: HashMap<&str, &ModRef> = mods
        .iter()
        .filter(|m| m.applies_to(side))
        .map(|m| (m.name.as_str(), m))
        .collect();

    if let Some(choices) = choices {
        if let Some(unknown) = choices.iter().find(|c| !known.contains(c.as_str())) {
            return Err(EngineError::ModSelection(format!("no mod named {unknown:?}")));
        }
    }

    let mut selected: HashSet<&str> = HashSet::new();
    for m in mods.iter().filter(|m| m.applies_to(side) && m.linked.is_none()) {
        let pick = if !m.is_optional_for(side) {
            true
        } else {
            match choices {
                Some(choices) => choices.iter().any(|c| c == &m.name),
                None => m.selected,
            }
        };
        if pick {
            selected.insert(m.name.as_str());
        }
    }

    loop {
        let mut added = Vec::new();

        for name in &selected {
            let Some(m) = applicable.get(name) else {
                continue;
            };
            for dep in &m.depends_on {
                if !known.contains(dep.as_str()) {
                    return Err(EngineError::ModSelection(format!(
                        "{} depends on unknown mod {:?}",
                        m.name, dep
                    )));
                }
                if applicable.contains_key(dep.as_str()) && !selected.contains(dep.as_str()) {
                    debug!("Selecting {} as a dependency of {}", dep, m.name);
                    added.push(dep.as_str());
                }
            }
        }

        for m in applicable.values() {
            if let Some(parent) = m.linked.as_deref() {
                if selected.contains(parent) && !selected.contains(m.name.as_str()) {
                    added.push(m.name.as_str());
                }
            }
        }

        if added.is_empty() {
            break;
        }
        selected.extend(added);
    }

    let mut groups: HashMap<&str, &str> = HashMap::new();
    for m in mods.iter().filter(|m| selected.contains(m.name.as_str())) {
        if let Some(group) = m.group.as_deref() {
            if let Some(other) = groups.insert(group, m.name.as_str()) {
                return Err(EngineError::ModSelection(format!(
                    "{} and {} are both selected from group {:?}",
                    other, m.name, group
                )));
            }
        }
    }

    Ok(mods
        .iter()
        .filter(|m| m.applies_to(side) && selected.contains(m.name.as_str()))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::ModKind;

    fn m(name: &str) -> ModRef {
        serde_json::from_value(serde_json::json!({
            "name": name, "type": "mods", "file": format!("{name}.jar")
        }))
        .unwrap()
    }

    fn names(mods: &[ModRef]) -> Vec<&str> {
        mods.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn defaults_take_required_and_preselected() {
        let mut opt_on = m("Minimap");
        opt_on.optional = true;
        opt_on.selected = true;
        let mut opt_off = m("Shaders");
        opt_off.optional = true;
        let mods = vec![m("Core"), opt_on, opt_off];

        let picked = select_mods(&mods, Side::Client, None).unwrap();
        assert_eq!(names(&picked), vec!["Core", "Minimap"]);
    }

    #[test]
    fn explicit_choices_override_defaults() {
        let mut a = m("A");
        a.optional = true;
        a.selected = true;
        let mut b = m("B");
        b.optional = true;
        let mods = vec![a, b];

        let choices = vec!["B".to_string()];
        let picked = select_mods(&mods, Side::Client, Some(&choices)).unwrap();
        assert_eq!(names(&picked), vec!["B"]);
    }

    #[test]
    fn dependencies_and_linked_mods_follow() {
        let mut addon = m("Addon");
        addon.optional = true;
        addon.depends_on = vec!["Lib".into()];
        let mut lib = m("Lib");
        lib.optional = true;
        lib.depends_on = vec!["Core".into()];
        let mut core = m("Core");
        core.optional = true;
        let mut config = m("AddonConfig");
        config.linked = Some("Addon".into());
        let mods = vec![core, lib, addon, config];

        let choices = vec!["Addon".to_string()];
        let picked = select_mods(&mods, Side::Client, Some(&choices)).unwrap();
        assert_eq!(names(&picked), vec!["Core", "Lib", "Addon", "AddonConfig"]);
    }

    #[test]
    fn group_allows_one_member() {
        let mut a = m("Sound A");
        a.optional = true;
        a.group = Some("sound".into());
        let mut b = m("Sound B");
        b.optional = true;
        b.group = Some("sound".into());
        let mods = vec![a, b];

        let both = vec!["Sound A".to_string(), "Sound B".to_string()];
        assert!(matches!(
            select_mods(&mods, Side::Client, Some(&both)),
            Err(EngineError::ModSelection(_))
        ));
        let one = vec!["Sound B".to_string()];
        assert_eq!(names(&select_mods(&mods, Side::Client, Some(&one)).unwrap()), vec!["Sound B"]);
    }

    #[test]
    fn side_filter_and_unknown_names() {
        let mut client_only = m("Minimap");
        client_only.server = false;
        client_only.kind = ModKind::Mods;
        let mods = vec![m("Core"), client_only];

        assert_eq!(names(&select_mods(&mods, Side::Server, None).unwrap()), vec!["Core"]);

        let bad = vec!["Nope".to_string()];
        assert!(select_mods(&mods, Side::Client, Some(&bad)).is_err());
    }
}
