use std::collections::HashMap;

use kylix_core::provo::PROVO_TABLE;

use crate::ast::Plan;
use crate::binding::Binding;
use crate::executor::{CANONICAL_OBJECT, CANONICAL_PREDICATE, CANONICAL_SUBJECT};

const AGGREGATE_ALIAS_PREFIXES: [&str; 2] = ["count", "count_"];

fn is_recognized_aggregate_alias(var: &str, plan: &Plan) -> bool {
    if plan.aggregates.iter().any(|a| a.alias == var) {
        return true;
    }
    var == "relationCount" || AGGREGATE_ALIAS_PREFIXES.iter().any(|p| var == *p || var.starts_with(p))
}

fn default_position(var: &str) -> Option<&'static str> {
    match var {
        "s" | "subject" | "person" => Some(CANONICAL_SUBJECT),
        "p" | "predicate" | "relation" => Some(CANONICAL_PREDICATE),
        "o" | "object" | "target" | "friend" => Some(CANONICAL_OBJECT),
        _ => None,
    }
}

/// Projects one bound row to the requested variables, following the
/// ordered rule chain in spec.md §4.8.
pub fn project(binding: &Binding, plan: &Plan) -> HashMap<String, Option<String>> {
    let mut vars: Vec<String> = if plan.select_star {
        let mut seen: Vec<String> = Vec::new();
        for v in &plan.variables {
            if !seen.contains(v) {
                seen.push(v.clone());
            }
        }
        if seen.is_empty() {
            vec!["s".to_string(), "p".to_string(), "o".to_string()]
        } else {
            seen
        }
    } else {
        plan.variables.clone()
    };
    for spec in &plan.aggregates {
        if !vars.contains(&spec.alias) {
            vars.push(spec.alias.clone());
        }
    }

    let mut out = HashMap::new();
    for var in vars {
        out.insert(var.clone(), project_one(binding, &var, plan));
    }
    out
}

fn project_one(binding: &Binding, var: &str, plan: &Plan) -> Option<String> {
    // Rule 1: a direct binding always wins.
    if let Some(v) = binding.get(var) {
        return Some(v.clone());
    }

    // Rule 2: project from the PROV-O role table for the predicate bound
    // in this row, if the requested variable names one of its roles.
    if let Some(predicate) = binding.get(CANONICAL_PREDICATE) {
        if let Some(role) = PROVO_TABLE.get(predicate.as_str()) {
            if var == role.subject_role {
                return binding.get(CANONICAL_SUBJECT).cloned();
            }
            if var == role.object_role {
                return binding.get(CANONICAL_OBJECT).cloned();
            }
        }
    }

    // Rule 3: recognized aggregate alias, already merged into the binding
    // by the aggregation stage if it matched; nothing left to project.
    if is_recognized_aggregate_alias(var, plan) {
        return binding.get(var).cloned();
    }

    // Rule 4: an explicit configured position mapping.
    if let Some(position) = plan.variable_positions.get(var) {
        let key = match position.as_str() {
            "s" => CANONICAL_SUBJECT,
            "p" => CANONICAL_PREDICATE,
            "o" => CANONICAL_OBJECT,
            _ => return None,
        };
        return binding.get(key).cloned();
    }

    // Rule 5: built-in positional defaults.
    if let Some(position) = default_position(var) {
        return binding.get(position).cloned();
    }

    // Rule 6: unresolvable.
    None
}
