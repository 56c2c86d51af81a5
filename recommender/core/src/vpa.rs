use std::{collections::BTreeMap, fmt};
use vpa_recommender_k8s_api::{Labels, Selector, UpdateMode};

/// Uniquely identifies a VPA object within the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VpaId {
    pub namespace: String,
    pub vpa_name: String,
}

/// The cluster-state view of a single VPA object.
#[derive(Clone, Debug, PartialEq)]
pub struct Vpa {
    pub id: VpaId,

    /// Selects the pods governed by this VPA. `None` selects no pods.
    pub pod_selector: Option<Selector>,

    pub conditions: Conditions,

    pub update_mode: UpdateMode,

    pub annotations: BTreeMap<String, String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionKind {
    RecommendationProvided,
    LowConfidence,
    NoPodsMatched,
    FetchingHistory,
    ConfigDeprecated,
    ConfigUnsupported,
}

/// Diagnostic conditions on a VPA, holding at most one message per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conditions([Option<String>; ConditionKind::COUNT]);

// === impl VpaId ===

impl VpaId {
    pub fn new(namespace: impl Into<String>, vpa_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            vpa_name: vpa_name.into(),
        }
    }
}

impl fmt::Display for VpaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.vpa_name)
    }
}

// === impl Vpa ===

impl Vpa {
    pub fn new(id: VpaId, pod_selector: Option<Selector>) -> Self {
        Self {
            id,
            pod_selector,
            conditions: Conditions::default(),
            update_mode: UpdateMode::default(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn set_condition(&mut self, kind: ConditionKind, message: impl Into<String>) {
        self.conditions.set(kind, message);
    }

    /// Tests whether a pod with the given labels is governed by this VPA.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.pod_selector
            .as_ref()
            .is_some_and(|selector| selector.matches(labels))
    }
}

// === impl ConditionKind ===

impl ConditionKind {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::RecommendationProvided,
        Self::LowConfidence,
        Self::NoPodsMatched,
        Self::FetchingHistory,
        Self::ConfigDeprecated,
        Self::ConfigUnsupported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecommendationProvided => "RecommendationProvided",
            Self::LowConfidence => "LowConfidence",
            Self::NoPodsMatched => "NoPodsMatched",
            Self::FetchingHistory => "FetchingHistory",
            Self::ConfigDeprecated => "ConfigDeprecated",
            Self::ConfigUnsupported => "ConfigUnsupported",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Conditions ===

impl Conditions {
    /// Sets the message for `kind`, returning the message it replaces.
    pub fn set(&mut self, kind: ConditionKind, message: impl Into<String>) -> Option<String> {
        self.0[kind.index()].replace(message.into())
    }

    pub fn remove(&mut self, kind: ConditionKind) -> Option<String> {
        self.0[kind.index()].take()
    }

    pub fn get(&self, kind: ConditionKind) -> Option<&str> {
        self.0[kind.index()].as_deref()
    }

    pub fn contains(&self, kind: ConditionKind) -> bool {
        self.0[kind.index()].is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConditionKind, &str)> {
        ConditionKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|msg| (kind, msg)))
    }

    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

impl std::iter::FromIterator<(ConditionKind, String)> for Conditions {
    fn from_iter<T: IntoIterator<Item = (ConditionKind, String)>>(iter: T) -> Self {
        let mut conditions = Self::default();
        for (kind, message) in iter {
            conditions.set(kind, message);
        }
        conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_hold_one_message_per_kind() {
        let mut conditions = Conditions::default();
        assert!(conditions.is_empty());

        assert_eq!(
            conditions.set(ConditionKind::ConfigUnsupported, "first"),
            None
        );
        assert_eq!(
            conditions.set(ConditionKind::ConfigUnsupported, "second"),
            Some("first".to_string())
        );
        conditions.set(ConditionKind::NoPodsMatched, "no pods");

        assert_eq!(conditions.len(), 2);
        assert_eq!(
            conditions.get(ConditionKind::ConfigUnsupported),
            Some("second")
        );
        assert!(!conditions.contains(ConditionKind::ConfigDeprecated));
        assert_eq!(
            conditions.iter().collect::<Vec<_>>(),
            vec![
                (ConditionKind::NoPodsMatched, "no pods"),
                (ConditionKind::ConfigUnsupported, "second"),
            ]
        );

        assert_eq!(
            conditions.remove(ConditionKind::NoPodsMatched),
            Some("no pods".to_string())
        );
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn vpa_without_selector_matches_nothing() {
        let labels = Some(("app", "web")).into_iter().collect::<Labels>();
        let mut vpa = Vpa::new(VpaId::new("ns", "web"), None);
        assert!(!vpa.matches(&labels));

        vpa.pod_selector = Some(Selector::nothing());
        assert!(!vpa.matches(&labels));

        vpa.pod_selector = Some("app=web".parse().unwrap());
        assert!(vpa.matches(&labels));
    }

    #[test]
    fn set_condition_replaces_message() {
        let mut vpa = Vpa::new(VpaId::new("ns", "web"), None);
        vpa.set_condition(ConditionKind::ConfigUnsupported, "first");
        vpa.set_condition(ConditionKind::ConfigUnsupported, "second");
        assert_eq!(vpa.conditions.len(), 1);
        assert_eq!(
            vpa.conditions.get(ConditionKind::ConfigUnsupported),
            Some("second")
        );
    }
}
