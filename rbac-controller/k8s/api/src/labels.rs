use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

/// Selects a set of namespaces by label. A namespace is selected when it
/// satisfies every `match_labels` pair and every expression.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    match_labels: Option<Map>,
    match_expressions: Option<Expressions>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Expression {
    key: String,
    operator: Operator,
    values: Option<BTreeSet<String>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

// === impl Selector ===

impl Selector {
    /// Selects namespaces carrying every one of the given labels.
    pub fn from_labels<K: ToString, V: ToString>(
        labels: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let match_labels = labels
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            match_labels: Some(match_labels),
            match_expressions: None,
        }
    }

    pub fn from_expressions(exprs: impl IntoIterator<Item = Expression>) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs.into_iter().collect()),
        }
    }

    /// Indicates whether this selector constrains nothing. Callers treat an
    /// empty selector as invalid input rather than as matching all
    /// namespaces.
    pub fn is_empty(&self) -> bool {
        let labels_empty = self.match_labels.as_ref().is_none_or(|l| l.is_empty());
        let exprs_empty = self.match_expressions.as_ref().is_none_or(|e| e.is_empty());
        labels_empty && exprs_empty
    }

    pub fn matches(&self, labels: &Map) -> bool {
        let pairs_hold = self
            .match_labels
            .iter()
            .flatten()
            .all(|(key, value)| labels.get(key).is_some_and(|found| found == value));
        pairs_hold
            && self
                .match_expressions
                .iter()
                .flatten()
                .all(|expr| expr.matches(labels))
    }
}

// === impl Expression ===

impl Expression {
    fn matches(&self, labels: &Map) -> bool {
        let found = labels.get(&self.key);
        let verdict = match (self.operator, self.values.as_ref()) {
            (Operator::In, Some(values)) => Some(found.is_some_and(|v| values.contains(v))),
            (Operator::NotIn, Some(values)) => Some(!found.is_some_and(|v| values.contains(v))),
            (Operator::Exists, None) => Some(found.is_some()),
            (Operator::DoesNotExist, None) => Some(found.is_none()),
            _ => None,
        };
        verdict.unwrap_or_else(|| {
            tracing::warn!(key = %self.key, operator = ?self.operator, "malformed selector expression");
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(pairs: &[(&str, &str)]) -> Map {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expr(key: &str, operator: Operator, values: &[&str]) -> Expression {
        Expression {
            key: key.to_string(),
            operator,
            values: (!values.is_empty()).then(|| values.iter().map(|v| v.to_string()).collect()),
        }
    }

    #[test]
    fn unconstrained_selector_matches_everything() {
        assert!(Selector::default().matches(&ns(&[])));
        assert!(Selector::default().matches(&ns(&[("team", "red")])));
    }

    #[test]
    fn match_labels_require_every_pair() {
        let selector = Selector::from_labels([("team", "red"), ("env", "prod")]);
        assert!(selector.matches(&ns(&[("team", "red"), ("env", "prod"), ("extra", "ok")])));
        assert!(!selector.matches(&ns(&[("team", "red")])), "missing key");
        assert!(
            !selector.matches(&ns(&[("team", "red"), ("env", "staging")])),
            "wrong value"
        );
    }

    #[test]
    fn in_expression_checks_membership() {
        let selector =
            Selector::from_expressions([expr("env", Operator::In, &["prod", "staging"])]);
        assert!(selector.matches(&ns(&[("env", "staging")])));
        assert!(!selector.matches(&ns(&[("env", "dev")])));
        assert!(!selector.matches(&ns(&[])), "absent key is not in the set");
    }

    #[test]
    fn not_in_expression_admits_absent_keys() {
        let selector = Selector::from_expressions([expr("env", Operator::NotIn, &["prod"])]);
        assert!(selector.matches(&ns(&[])));
        assert!(selector.matches(&ns(&[("env", "dev")])));
        assert!(!selector.matches(&ns(&[("env", "prod")])));
    }

    #[test]
    fn existence_is_keyed_on_presence() {
        let exists = Selector::from_expressions([expr("team", Operator::Exists, &[])]);
        assert!(exists.matches(&ns(&[("team", "anything")])));
        assert!(!exists.matches(&ns(&[("other", "x")])));

        let absent = Selector::from_expressions([expr("team", Operator::DoesNotExist, &[])]);
        assert!(absent.matches(&ns(&[("other", "x")])));
        assert!(!absent.matches(&ns(&[("team", "red")])));
    }

    #[test]
    fn labels_and_expressions_are_anded() {
        let selector = Selector {
            match_labels: Some(ns(&[("team", "red")])),
            match_expressions: Some(vec![expr("env", Operator::Exists, &[])]),
        };
        assert!(selector.matches(&ns(&[("team", "red"), ("env", "prod")])));
        assert!(!selector.matches(&ns(&[("team", "red")])), "expression unmet");
        assert!(!selector.matches(&ns(&[("env", "prod")])), "label unmet");
    }

    #[test]
    fn malformed_expressions_never_match() {
        // In needs values; Exists must not carry any.
        let missing_values = Selector::from_expressions([expr("env", Operator::In, &[])]);
        assert!(!missing_values.matches(&ns(&[("env", "prod")])));

        let stray_values = Selector::from_expressions([expr("env", Operator::Exists, &["prod"])]);
        assert!(!stray_values.matches(&ns(&[("env", "prod")])));
    }

    #[test]
    fn empty_selectors_are_detected() {
        assert!(Selector::default().is_empty());
        assert!(Selector::from_labels(Vec::<(String, String)>::new()).is_empty());
        assert!(Selector::from_expressions(Vec::new()).is_empty());
        assert!(!Selector::from_labels([("team", "red")]).is_empty());
        assert!(!Selector::from_expressions([expr("team", Operator::Exists, &[])]).is_empty());
    }
}
