use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
    sync::Arc,
};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// A predicate over a pod's labels.
///
/// `Nothing` never matches. `Requirements` matches labels that satisfy every
/// requirement, so an empty requirement list matches everything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Nothing,
    Requirements(Vec<Requirement>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSelector {
    #[error("unbalanced parentheses in {0:?}")]
    Unbalanced(String),

    #[error("empty requirement")]
    EmptyRequirement,

    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    #[error("invalid label value {0:?}")]
    InvalidValue(String),

    #[error("unknown operator {0:?}")]
    UnknownOperator(String),

    #[error("operator {operator} takes {expected} value(s)")]
    ValueCount {
        operator: Operator,
        expected: &'static str,
    },
}

// === Selector ===

impl Selector {
    /// Returns a selector that matches no labels.
    pub fn nothing() -> Self {
        Self::Nothing
    }

    /// Returns a selector that matches all labels.
    pub fn everything() -> Self {
        Self::Requirements(Vec::new())
    }

    pub fn from_requirements(mut reqs: Vec<Requirement>) -> Self {
        reqs.sort_by(|a, b| a.key.cmp(&b.key));
        Self::Requirements(reqs)
    }

    pub fn from_map(map: Map) -> Self {
        map.into_iter()
            .map(|(key, value)| Requirement {
                key,
                operator: Operator::Equals,
                values: Some(value).into_iter().collect(),
            })
            .collect()
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Self::Nothing => false,
            Self::Requirements(reqs) => reqs.iter().all(|r| r.matches(labels.as_ref())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("<nothing>"),
            Self::Requirements(reqs) => {
                for (i, r) in reqs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    fmt::Display::fmt(r, f)?;
                }
                Ok(())
            }
        }
    }
}

/// Parses the textual selector form, e.g. `app=web,tier!=cache,env in (qa,staging),!canary`.
impl FromStr for Selector {
    type Err = InvalidSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::everything());
        }

        let reqs = split_terms(s)?
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<Requirement>, _>>()?;
        Ok(Self::from_requirements(reqs))
    }
}

/// Converts a Kubernetes `LabelSelector`. As in Kubernetes, an empty
/// selector matches everything.
impl TryFrom<&LabelSelector> for Selector {
    type Error = InvalidSelector;

    fn try_from(selector: &LabelSelector) -> Result<Self, Self::Error> {
        let mut reqs = Vec::new();

        for (key, value) in selector.match_labels.iter().flatten() {
            reqs.push(Requirement::new(
                key.clone(),
                Operator::Equals,
                Some(value.clone()),
            )?);
        }

        for LabelSelectorRequirement {
            key,
            operator,
            values,
        } in selector.match_expressions.iter().flatten()
        {
            let operator = match operator.as_str() {
                "In" => Operator::In,
                "NotIn" => Operator::NotIn,
                "Exists" => Operator::Exists,
                "DoesNotExist" => Operator::DoesNotExist,
                op => return Err(InvalidSelector::UnknownOperator(op.to_string())),
            };
            reqs.push(Requirement::new(
                key.clone(),
                operator,
                values.iter().flatten().cloned(),
            )?);
        }

        Ok(Self::from_requirements(reqs))
    }
}

impl std::iter::FromIterator<Requirement> for Selector {
    fn from_iter<T: IntoIterator<Item = Requirement>>(iter: T) -> Self {
        Self::from_requirements(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Splits a selector on top-level commas, leaving set-based value lists intact.
fn split_terms(s: &str) -> Result<Vec<&str>, InvalidSelector> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| InvalidSelector::Unbalanced(s.to_string()))?;
            }
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(InvalidSelector::Unbalanced(s.to_string()));
    }
    terms.push(&s[start..]);
    Ok(terms)
}

// === Requirement ===

impl Requirement {
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = String>,
    ) -> Result<Self, InvalidSelector> {
        let key = key.into();
        if !valid_key(&key) {
            return Err(InvalidSelector::InvalidKey(key));
        }

        let values = values.into_iter().collect::<BTreeSet<_>>();
        if let Some(v) = values.iter().find(|v| !valid_value(v)) {
            return Err(InvalidSelector::InvalidValue(v.clone()));
        }

        let expected = match operator {
            Operator::Equals | Operator::NotEquals if values.len() != 1 => Some("exactly one"),
            Operator::In | Operator::NotIn if values.is_empty() => Some("at least one"),
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => Some("no"),
            _ => None,
        };
        if let Some(expected) = expected {
            return Err(InvalidSelector::ValueCount { operator, expected });
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    fn matches(&self, labels: &Map) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, values),
            Operator::NotEquals => write!(f, "{}!={}", self.key, values),
            Operator::In => write!(f, "{} in ({})", self.key, values),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, values),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

impl FromStr for Requirement {
    type Err = InvalidSelector;

    fn from_str(term: &str) -> Result<Self, Self::Err> {
        let term = term.trim();
        if term.is_empty() {
            return Err(InvalidSelector::EmptyRequirement);
        }

        if let Some(key) = term.strip_prefix('!') {
            return Self::new(key.trim(), Operator::DoesNotExist, None);
        }

        if let Some((key, value)) = term.split_once("!=") {
            return Self::new(key.trim(), Operator::NotEquals, Some(value.trim().to_string()));
        }

        if let Some((key, value)) = term
            .split_once("==")
            .or_else(|| term.split_once('='))
        {
            return Self::new(key.trim(), Operator::Equals, Some(value.trim().to_string()));
        }

        if let Some((head, rest)) = term.split_once('(') {
            let list = rest
                .strip_suffix(')')
                .ok_or_else(|| InvalidSelector::Unbalanced(term.to_string()))?;
            let mut words = head.split_whitespace();
            let (key, op) = match (words.next(), words.next(), words.next()) {
                (Some(key), Some(op), None) => (key, op),
                _ => return Err(InvalidSelector::UnknownOperator(head.trim().to_string())),
            };
            let operator = match op {
                "in" => Operator::In,
                "notin" => Operator::NotIn,
                op => return Err(InvalidSelector::UnknownOperator(op.to_string())),
            };
            let values = list
                .split(',')
                .map(|v| v.trim().to_string())
                .collect::<Vec<_>>();
            if values.iter().any(String::is_empty) {
                return Err(InvalidSelector::InvalidValue(list.to_string()));
            }
            return Self::new(key, operator, values);
        }

        Self::new(term, Operator::Exists, None)
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn valid_value(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

// === Operator ===

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
        };
        f.write_str(s)
    }
}

// === Labels ===

impl Labels {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.map(Into::into).unwrap_or_default()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::everything(), Labels::default(), true, "empty match"),
            (Selector::nothing(), Labels::default(), false, "nothing"),
            (
                Selector::nothing(),
                Labels::from_iter(Some(("foo", "bar"))),
                false,
                "nothing with labels",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "baz"))),
                false,
                "label value mismatch",
            ),
            (
                "foo in (bar)".parse().unwrap(),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "expression match",
            ),
            (
                "foo notin (bar)".parse().unwrap(),
                Labels::from_iter(Some(("foo", "bar"))),
                false,
                "notin excludes listed value",
            ),
            (
                "foo notin (bar)".parse().unwrap(),
                Labels::default(),
                true,
                "notin admits missing key",
            ),
            (
                "foo".parse().unwrap(),
                Labels::from_iter(Some(("foo", ""))),
                true,
                "exists",
            ),
            (
                "!foo".parse().unwrap(),
                Labels::from_iter(Some(("foo", "bar"))),
                false,
                "does not exist",
            ),
            (
                "foo!=bar".parse().unwrap(),
                Labels::default(),
                true,
                "not equals admits missing key",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn parses_equality_and_set_terms() {
        let sel = "environment in (staging, qa),name=vpa-pod"
            .parse::<Selector>()
            .unwrap();
        assert_eq!(sel.to_string(), "environment in (qa,staging),name=vpa-pod");

        let staging = Labels::from_iter(vec![("name", "vpa-pod"), ("environment", "staging")]);
        let production =
            Labels::from_iter(vec![("name", "vpa-pod"), ("environment", "production")]);
        assert!(sel.matches(&staging));
        assert!(!sel.matches(&production));

        assert_eq!(
            "name == vpa-pod".parse::<Selector>().unwrap(),
            Selector::from_iter(Some(("name", "vpa-pod")))
        );
    }

    #[test]
    fn rejects_malformed_selectors() {
        for input in [
            "a=b,,c=d",
            "env in (qa",
            "env in qa)",
            "env within (qa)",
            "env in ()",
            "bad key=x",
        ] {
            assert!(input.parse::<Selector>().is_err(), "{input:?} should not parse");
        }
    }

    #[test]
    fn converts_label_selector() {
        let ls = LabelSelector {
            match_labels: Some(
                Some(("app".to_string(), "web".to_string()))
                    .into_iter()
                    .collect(),
            ),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "NotIn".to_string(),
                values: Some(vec!["cache".to_string()]),
            }]),
        };
        let sel = Selector::try_from(&ls).unwrap();
        assert_eq!(sel.to_string(), "app=web,tier notin (cache)");
        assert!(sel.matches(&Labels::from_iter(Some(("app", "web")))));

        assert_eq!(
            Selector::try_from(&LabelSelector::default()).unwrap(),
            Selector::everything()
        );

        let bad = LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "Gt".to_string(),
                values: None,
            }]),
            ..Default::default()
        };
        assert_eq!(
            Selector::try_from(&bad),
            Err(InvalidSelector::UnknownOperator("Gt".to_string()))
        );
    }
}
