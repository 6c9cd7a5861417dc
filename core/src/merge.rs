/// Reconciliation of a LOCAL store against an INCOMING one
///
/// Used for template updates, version-control pulls and uploads. Units are
/// matched by identity key only (any child id for plural groups). The merge
/// is planned against both stores first and applied afterwards, so a policy
/// violation leaves LOCAL untouched.
use crate::config::{MergeOptions, OverwritePolicy};
use crate::error::StoreError;
use crate::multistring::Multistring;
use crate::store::TranslationStore;
use crate::unit::TranslationUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Header fields INCOMING always wins on.
const HEADER_UPDATE_KEYS: &[&str] = &[
    "Content-Type",
    "POT-Creation-Date",
    "Last-Translator",
    "Project-Id-Version",
    "PO-Revision-Date",
    "Language-Team",
];

/// Header fields accepted from INCOMING when LOCAL lacks them.
const HEADER_KNOWN_KEYS: &[&str] = &[
    "Project-Id-Version",
    "Report-Msgid-Bugs-To",
    "POT-Creation-Date",
    "PO-Revision-Date",
    "Last-Translator",
    "Language-Team",
    "Language",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Plural-Forms",
    "X-Generator",
];

/// A proposed target kept aside instead of being written into LOCAL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub unit_id: String,
    pub proposed_target: Multistring,
    pub author: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub suggestions: Vec<Suggestion>,
    pub added: usize,
    pub updated: usize,
    pub obsoleted: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Add { incoming: usize },
    Resurrect { local: usize },
    Merge { local: usize, incoming: usize },
    Suggest { incoming: usize },
    Obsolete { local: usize },
    Keep,
}

/// Merge `incoming` into `local` and report what happened.
///
/// On error nothing in `local` has been modified.
pub fn merge_stores(
    local: &mut dyn TranslationStore,
    incoming: &dyn TranslationStore,
    options: &MergeOptions,
) -> Result<MergeOutcome, StoreError> {
    let steps = plan(local, incoming, options)?;
    log::debug!(
        "merge: {} steps planned for {} local and {} incoming units",
        steps.len(),
        local.unit_count(),
        incoming.unit_count()
    );

    let mut outcome = MergeOutcome::default();
    for step in steps {
        match step {
            Step::Add { incoming: position } => {
                let Some(other) = incoming.unit(position) else {
                    continue;
                };
                let index = local.add_unit_from(other);
                if options.notranslate {
                    if let Some(unit) = local.unit_mut(index) {
                        unit.set_target(None);
                        unit.mark_fuzzy(false);
                    }
                }
                outcome.added += 1;
            }
            Step::Resurrect { local: index } => {
                if let Some(unit) = local.unit_mut(index) {
                    unit.resurrect();
                    outcome.updated += 1;
                }
            }
            Step::Merge {
                local: index,
                incoming: position,
            } => {
                let (Some(other), Some(unit)) = (incoming.unit(position), local.unit_mut(index)) else {
                    continue;
                };
                let before = (unit.target(), unit.is_fuzzy());
                unit.merge_from(other, options.overwrite == OverwritePolicy::Always, true);
                if (unit.target(), unit.is_fuzzy()) != before {
                    outcome.updated += 1;
                } else {
                    outcome.unchanged += 1;
                }
            }
            Step::Suggest { incoming: position } => {
                let Some(other) = incoming.unit(position) else {
                    continue;
                };
                outcome.suggestions.push(Suggestion {
                    id: Uuid::new_v4(),
                    unit_id: other.id(),
                    proposed_target: other.target().unwrap_or_default(),
                    author: options.author.clone(),
                });
            }
            Step::Obsolete { local: index } => {
                if let Some(unit) = local.unit_mut(index) {
                    unit.make_obsolete();
                    outcome.obsoleted += 1;
                }
            }
            Step::Keep => outcome.unchanged += 1,
        }
    }

    if !(options.notranslate || options.suggestions) {
        merge_header(local, incoming);
    }
    local.invalidate_index();

    log::info!(
        "merge: {} added, {} updated, {} obsoleted, {} unchanged, {} suggestions",
        outcome.added,
        outcome.updated,
        outcome.obsoleted,
        outcome.unchanged,
        outcome.suggestions.len()
    );
    Ok(outcome)
}

fn plan(
    local: &dyn TranslationStore,
    incoming: &dyn TranslationStore,
    options: &MergeOptions,
) -> Result<Vec<Step>, StoreError> {
    let mut steps = Vec::new();
    let mut incoming_ids = HashSet::new();
    let mut matched = HashSet::new();
    let mut proposals = HashSet::new();

    for position in 0..incoming.unit_count() {
        let Some(unit) = incoming.unit(position) else {
            continue;
        };
        if unit.is_header() || unit.is_blank() {
            continue;
        }
        let ids = unit.child_ids();
        let found = ids.iter().find_map(|id| local.find_id(id));
        incoming_ids.extend(ids);

        let Some(index) = found else {
            if options.allow_new_strings {
                log::debug!("merge: adding {:?}", unit.id());
                steps.push(Step::Add { incoming: position });
            }
            continue;
        };
        if !matched.insert(index) {
            log::debug!("merge: {:?} already matched, skipping duplicate", unit.id());
            continue;
        }
        let Some(existing) = local.unit(index) else {
            continue;
        };
        if existing.is_obsolete() && !unit.is_obsolete() {
            steps.push(Step::Resurrect { local: index });
        }
        steps.push(plan_shared(existing, unit, position, index, options, &mut proposals)?);
    }

    if options.obsolete_missing {
        for index in 0..local.unit_count() {
            let Some(unit) = local.unit(index) else {
                continue;
            };
            if matched.contains(&index) || unit.is_header() || unit.is_blank() {
                continue;
            }
            if unit.is_obsolete() || unit.child_ids().iter().any(|id| incoming_ids.contains(id)) {
                steps.push(Step::Keep);
            } else {
                log::debug!("merge: obsoleting {:?}", unit.id());
                steps.push(Step::Obsolete { local: index });
            }
        }
    }
    Ok(steps)
}

/// Decide what happens to a LOCAL unit that INCOMING also carries.
fn plan_shared(
    existing: &dyn TranslationUnit,
    unit: &dyn TranslationUnit,
    position: usize,
    index: usize,
    options: &MergeOptions,
    proposals: &mut HashSet<(usize, Multistring)>,
) -> Result<Step, StoreError> {
    if !unit.is_translated() {
        return Ok(Step::Keep);
    }
    let proposed = unit.target().unwrap_or_default();
    let current = existing.target();

    if options.notranslate || (options.suggestions && existing.is_translated()) {
        if current.as_ref() == Some(&proposed) || !proposals.insert((index, proposed)) {
            return Ok(Step::Keep);
        }
        log::debug!("merge: suggesting a new target for {:?}", existing.id());
        return Ok(Step::Suggest { incoming: position });
    }

    let has_target = current.as_ref().map_or(false, |t| !t.is_empty());
    if has_target && current.as_ref() != Some(&proposed) && options.overwrite == OverwritePolicy::Never {
        return Err(StoreError::MergeConflictPolicy { id: existing.id() });
    }
    Ok(Step::Merge {
        local: index,
        incoming: position,
    })
}

/// Pull selected header fields from INCOMING.
fn merge_header(local: &mut dyn TranslationStore, incoming: &dyn TranslationStore) {
    let theirs = incoming.header_fields();
    if theirs.is_empty() {
        return;
    }
    let ours = local.header_fields();
    for (key, value) in theirs {
        let is = |names: &[&str]| names.iter().any(|name| name.eq_ignore_ascii_case(&key));
        let missing = ours
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .map_or(true, |(_, v)| v.is_empty());
        if is(HEADER_UPDATE_KEYS) || (missing && is(HEADER_KNOWN_KEYS)) {
            local.set_header_field(&key, &value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::formats::po::PoStore;

    fn po(raw: &str) -> PoStore {
        let mut store = PoStore::new();
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    fn target(store: &PoStore, id: &str) -> Option<String> {
        let index = store.find_id(id)?;
        store.unit(index)?.target().map(|t| t.to_string())
    }

    #[test]
    fn fills_empty_targets() {
        let mut local = po("msgid \"Save\"\nmsgstr \"\"\n");
        let incoming = po("msgid \"Save\"\nmsgstr \"Stoor\"\n");
        let outcome = merge_stores(&mut local, &incoming, &MergeOptions::default()).unwrap();
        assert_eq!(target(&local, "Save").as_deref(), Some("Stoor"));
        assert_eq!(outcome.updated, 1);
        assert!(outcome.suggestions.is_empty());
    }

    #[test]
    fn translated_target_survives_without_overwrite() {
        let mut local = po("msgid \"Save\"\nmsgstr \"Stoor\"\n");
        let incoming = po("msgid \"Save\"\nmsgstr \"Bewaar\"\n");
        let outcome = merge_stores(&mut local, &incoming, &MergeOptions::default()).unwrap();
        assert_eq!(target(&local, "Save").as_deref(), Some("Stoor"));
        assert_eq!(outcome.unchanged, 1);
    }

    #[test]
    fn overwrite_always_replaces() {
        let mut local = po("msgid \"Save\"\nmsgstr \"Stoor\"\n");
        let incoming = po("msgid \"Save\"\nmsgstr \"Bewaar\"\n");
        let options = MergeOptions {
            overwrite: OverwritePolicy::Always,
            ..MergeOptions::default()
        };
        merge_stores(&mut local, &incoming, &options).unwrap();
        assert_eq!(target(&local, "Save").as_deref(), Some("Bewaar"));
    }

    #[test]
    fn overwrite_never_fails_before_touching_local() {
        let mut local = po("msgid \"Save\"\nmsgstr \"Stoor\"\n\nmsgid \"Gone\"\nmsgstr \"Weg\"\n");
        let incoming = po("msgid \"Save\"\nmsgstr \"Bewaar\"\n\nmsgid \"New\"\nmsgstr \"Nuut\"\n");
        let before = local.serialize().unwrap();
        let options = MergeOptions {
            overwrite: OverwritePolicy::Never,
            ..MergeOptions::default()
        };
        let err = merge_stores(&mut local, &incoming, &options).unwrap_err();
        assert!(matches!(err, StoreError::MergeConflictPolicy { ref id } if id == "Save"));
        assert_eq!(local.serialize().unwrap(), before);
    }

    #[test]
    fn suggestions_leave_translations_alone() {
        let mut local = po("msgid \"Save\"\nmsgstr \"Stoor\"\n\nmsgid \"Open\"\nmsgstr \"\"\n");
        let incoming = po("msgid \"Save\"\nmsgstr \"Bewaar\"\n\nmsgid \"Open\"\nmsgstr \"Maak oop\"\n");
        let options = MergeOptions {
            suggestions: true,
            author: "reviewer".to_string(),
            ..MergeOptions::default()
        };
        let outcome = merge_stores(&mut local, &incoming, &options).unwrap();
        assert_eq!(target(&local, "Save").as_deref(), Some("Stoor"));
        assert_eq!(target(&local, "Open").as_deref(), Some("Maak oop"));
        assert_eq!(outcome.suggestions.len(), 1);
        let suggestion = &outcome.suggestions[0];
        assert_eq!(suggestion.unit_id, "Save");
        assert_eq!(suggestion.proposed_target, "Bewaar");
        assert_eq!(suggestion.author, "reviewer");
        assert_eq!(suggestion.id.get_version_num(), 4);
    }

    #[test]
    fn notranslate_turns_everything_into_suggestions() {
        let mut local = po("msgid \"Open\"\nmsgstr \"\"\n");
        let incoming = po("msgid \"Open\"\nmsgstr \"Maak oop\"\n\nmsgid \"New\"\nmsgstr \"Nuut\"\n");
        let options = MergeOptions {
            notranslate: true,
            ..MergeOptions::default()
        };
        let outcome = merge_stores(&mut local, &incoming, &options).unwrap();
        assert_eq!(target(&local, "Open"), None);
        assert_eq!(target(&local, "New"), None);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.suggestions.len(), 1);
    }

    #[test]
    fn missing_units_become_obsolete_only_when_asked() {
        let raw = "msgid \"Keep\"\nmsgstr \"Hou\"\n\nmsgid \"Drop\"\nmsgstr \"Los\"\n";
        let incoming = po("msgid \"Keep\"\nmsgstr \"\"\n");

        let mut local = po(raw);
        let outcome = merge_stores(&mut local, &incoming, &MergeOptions::default()).unwrap();
        assert_eq!(local.unit_count(), 2);
        assert!(local.unit(local.find_id("Drop").unwrap()).unwrap().is_obsolete());
        assert_eq!(outcome.obsoleted, 1);

        let mut local = po(raw);
        let options = MergeOptions {
            obsolete_missing: false,
            ..MergeOptions::default()
        };
        merge_stores(&mut local, &incoming, &options).unwrap();
        assert!(!local.unit(local.find_id("Drop").unwrap()).unwrap().is_obsolete());
    }

    #[test]
    fn new_strings_need_permission() {
        let incoming = po("msgid \"New\"\nmsgstr \"Nuut\"\n");
        let mut local = po("");
        let options = MergeOptions {
            allow_new_strings: false,
            ..MergeOptions::default()
        };
        let outcome = merge_stores(&mut local, &incoming, &options).unwrap();
        assert_eq!(local.unit_count(), 0);
        assert_eq!(outcome.added, 0);
    }

    #[test]
    fn returning_unit_is_resurrected() {
        let mut local = po("#~ msgid \"Back\"\n#~ msgstr \"Terug\"\n");
        let incoming = po("msgid \"Back\"\nmsgstr \"\"\n");
        merge_stores(&mut local, &incoming, &MergeOptions::default()).unwrap();
        let unit = local.unit(0).unwrap();
        assert!(!unit.is_obsolete());
        assert_eq!(unit.target(), Some(Multistring::from("Terug")));
    }

    #[test]
    fn header_takes_selected_fields() {
        let mut local = po(concat!(
            "msgid \"\"\nmsgstr \"\"\n",
            "\"Project-Id-Version: old\\n\"\n",
            "\"Language: af\\n\"\n",
        ));
        let incoming = po(concat!(
            "msgid \"\"\nmsgstr \"\"\n",
            "\"Project-Id-Version: new\\n\"\n",
            "\"Language: de\\n\"\n",
            "\"MIME-Version: 1.0\\n\"\n",
            "\"X-Custom: skipped\\n\"\n",
        ));
        merge_stores(&mut local, &incoming, &MergeOptions::default()).unwrap();
        assert_eq!(local.header_field("Project-Id-Version").as_deref(), Some("new"));
        assert_eq!(local.header_field("Language").as_deref(), Some("af"));
        assert_eq!(local.header_field("MIME-Version").as_deref(), Some("1.0"));
        assert_eq!(local.header_field("X-Custom"), None);
    }
}
