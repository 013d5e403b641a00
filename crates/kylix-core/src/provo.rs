//! The PROV-O predicate→role table (spec.md GLOSSARY), encoded as a
//! compile-time constant map per spec.md §9's design note.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// The kind of entity admitted in a subject or object position for a given
/// PROV-O predicate. Used both by the admission pipeline's shape check
/// (C4 step 4) and by the variable mapper's role-based projection (C8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvoKind {
    Entity,
    Activity,
    Agent,
}

/// The subject/object role names a predicate binds, e.g. `wasGeneratedBy`
/// binds its subject to the `entity` role and its object to the `activity`
/// role.
#[derive(Clone, Copy, Debug)]
pub struct ProvoRole {
    pub subject_kind: ProvoKind,
    pub subject_role: &'static str,
    pub object_kind: ProvoKind,
    pub object_role: &'static str,
}

/// The canonical PROV-O role table (GLOSSARY). Predicates not present here
/// are "unrecognized" — the admission pipeline passes them through
/// unchecked (spec.md §4.4 step 4) and the variable mapper falls through to
/// its next rule (spec.md §4.8).
pub static PROVO_TABLE: Lazy<HashMap<&'static str, ProvoRole>> = Lazy::new(|| {
    use ProvoKind::*;
    let mut m = HashMap::new();
    m.insert(
        "wasGeneratedBy",
        ProvoRole {
            subject_kind: Entity,
            subject_role: "entity",
            object_kind: Activity,
            object_role: "activity",
        },
    );
    m.insert(
        "wasAttributedTo",
        ProvoRole {
            subject_kind: Entity,
            subject_role: "entity",
            object_kind: Agent,
            object_role: "agent",
        },
    );
    m.insert(
        "wasDerivedFrom",
        ProvoRole {
            subject_kind: Entity,
            subject_role: "entity",
            object_kind: Entity,
            object_role: "entity",
        },
    );
    m.insert(
        "wasInformedBy",
        ProvoRole {
            subject_kind: Activity,
            subject_role: "activity",
            object_kind: Activity,
            object_role: "activity",
        },
    );
    m.insert(
        "actedOnBehalfOf",
        ProvoRole {
            subject_kind: Agent,
            subject_role: "agent",
            object_kind: Agent,
            object_role: "agent",
        },
    );
    m.insert(
        "wasAssociatedWith",
        ProvoRole {
            subject_kind: Activity,
            subject_role: "activity",
            object_kind: Agent,
            object_role: "agent",
        },
    );
    m.insert(
        "used",
        ProvoRole {
            subject_kind: Activity,
            subject_role: "activity",
            object_kind: Entity,
            object_role: "entity",
        },
    );
    m.insert(
        "wasStartedBy",
        ProvoRole {
            subject_kind: Activity,
            subject_role: "activity",
            object_kind: Entity,
            object_role: "entity",
        },
    );
    m.insert(
        "wasEndedBy",
        ProvoRole {
            subject_kind: Activity,
            subject_role: "activity",
            object_kind: Entity,
            object_role: "entity",
        },
    );
    m.insert(
        "wasInvalidatedBy",
        ProvoRole {
            subject_kind: Entity,
            subject_role: "entity",
            object_kind: Activity,
            object_role: "activity",
        },
    );
    m
});

/// The kind prefixes recognized when checking subject/object admission for
/// a PROV-O predicate (e.g. `entity:e1`, `activity:a1`, `agent:agent1`).
/// A value with no recognized prefix is treated as compatible with any
/// kind — the shape check only rejects a value whose prefix names a
/// *different* kind than the role requires.
fn prefix_kind(value: &str) -> Option<ProvoKind> {
    if let Some((prefix, _)) = value.split_once(':') {
        match prefix {
            "entity" => Some(ProvoKind::Entity),
            "activity" => Some(ProvoKind::Activity),
            "agent" => Some(ProvoKind::Agent),
            _ => None,
        }
    } else {
        None
    }
}

/// Strip a namespace prefix (e.g. `prov:wasGeneratedBy` -> `wasGeneratedBy`)
/// before table lookup. `PROVO_TABLE`'s keys are bare local names; a caller
/// writing the fully-qualified PROV-O term must still be recognized.
fn local_name(predicate: &str) -> &str {
    predicate.rsplit(':').next().unwrap_or(predicate)
}

/// Check a `(subject, predicate, object)` triple against the PROV-O role
/// table. Returns `true` if the predicate is unrecognized (pass-through) or
/// if both positions are compatible with their required role kind.
pub fn check_shape(subject: &str, predicate: &str, object: &str) -> bool {
    let Some(role) = PROVO_TABLE.get(local_name(predicate)) else {
        return true;
    };
    let subject_ok = prefix_kind(subject).map_or(true, |k| k == role.subject_kind);
    let object_ok = prefix_kind(object).map_or(true, |k| k == role.object_kind);
    subject_ok && object_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_was_generated_by() {
        // wasGeneratedBy expects entity -> activity; this is reversed.
        assert!(!check_shape(
            "activity:a1",
            "wasGeneratedBy",
            "entity:e1"
        ));
    }

    #[test]
    fn accepts_matching_was_generated_by() {
        assert!(check_shape("entity:e1", "wasGeneratedBy", "activity:a1"));
    }

    #[test]
    fn passes_through_unrecognized_predicates() {
        assert!(check_shape("Alice", "owns", "Car123"));
    }

    #[test]
    fn accepts_untyped_values_without_a_recognized_prefix() {
        assert!(check_shape("Alice", "wasAttributedTo", "Bob"));
    }

    #[test]
    fn rejects_mismatched_namespaced_predicate() {
        // "prov:wasGeneratedBy" must resolve to the same role as the bare
        // "wasGeneratedBy" local name, so a reversed subject/object is
        // still caught rather than silently passing through as unrecognized.
        assert!(!check_shape(
            "activity:a1",
            "prov:wasGeneratedBy",
            "entity:e1"
        ));
    }

    #[test]
    fn accepts_matching_namespaced_predicate() {
        assert!(check_shape(
            "entity:e1",
            "prov:wasGeneratedBy",
            "activity:a1"
        ));
    }
}
