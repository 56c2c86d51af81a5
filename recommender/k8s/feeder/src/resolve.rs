use crate::fetcher::FetchError;
use vpa_recommender_core::{ConditionKind, Conditions, Selector};

pub const CANNOT_READ_TARGET_REF: &str = "Cannot read targetRef";

pub const LEGACY_SELECTOR_UNSUPPORTED: &str =
    "Label selector is no longer supported, please migrate to targetRef";

pub const BOTH_SELECTORS_DEFINED: &str =
    "Both targetRef and label selector defined. Please remove label selector";

/// The outcome of a single selector fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fetched {
    Absent,
    Present(Selector),
    Failed(String),
}

/// The selector chosen for a VPA and the conditions explaining the choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub selector: Selector,
    pub conditions: Conditions,
}

/// Chooses between the legacy and the `targetRef` selectors.
///
/// A legacy selector never takes effect. Whenever both selectors are
/// present, or neither is, the VPA selects nothing and a `ConfigUnsupported`
/// condition describes why. Only the `targetRef` fetch error is reported.
pub fn resolve(legacy: &Fetched, current: Fetched) -> Resolution {
    match (legacy.is_present(), current) {
        (true, Fetched::Present(_)) => Resolution::unsupported(BOTH_SELECTORS_DEFINED),
        (false, Fetched::Present(selector)) => Resolution {
            selector,
            conditions: Conditions::default(),
        },
        (true, Fetched::Absent | Fetched::Failed(_)) => {
            Resolution::unsupported(LEGACY_SELECTOR_UNSUPPORTED)
        }
        (false, Fetched::Failed(reason)) => {
            Resolution::unsupported(format!("{CANNOT_READ_TARGET_REF}. Reason: {reason}"))
        }
        (false, Fetched::Absent) => Resolution::unsupported(CANNOT_READ_TARGET_REF),
    }
}

// === impl Fetched ===

impl Fetched {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl From<Result<Option<Selector>, FetchError>> for Fetched {
    fn from(res: Result<Option<Selector>, FetchError>) -> Self {
        match res {
            Ok(Some(selector)) => Self::Present(selector),
            Ok(None) => Self::Absent,
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

// === impl Resolution ===

impl Resolution {
    fn unsupported(message: impl Into<String>) -> Self {
        Self {
            selector: Selector::nothing(),
            conditions: Some((ConditionKind::ConfigUnsupported, message.into()))
                .into_iter()
                .collect(),
        }
    }

    pub fn unsupported_reason(&self) -> Option<&str> {
        self.conditions.get(ConditionKind::ConfigUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(s: &str) -> Selector {
        s.parse().unwrap()
    }

    #[test]
    fn decision_table() {
        for (legacy, current, expected, reason) in [
            (
                Fetched::Absent,
                Fetched::from(Err(FetchError::TargetRefNotDefined)),
                Selector::nothing(),
                Some("Cannot read targetRef. Reason: targetRef not defined"),
            ),
            (
                Fetched::Absent,
                Fetched::Absent,
                Selector::nothing(),
                Some("Cannot read targetRef"),
            ),
            (
                Fetched::Present(selector("app=test")),
                Fetched::Failed("targetRef not defined".to_string()),
                Selector::nothing(),
                Some("Label selector is no longer supported, please migrate to targetRef"),
            ),
            (
                Fetched::Present(selector("app=test")),
                Fetched::Absent,
                Selector::nothing(),
                Some("Label selector is no longer supported, please migrate to targetRef"),
            ),
            (
                Fetched::Absent,
                Fetched::Present(selector("app=test")),
                selector("app=test"),
                None,
            ),
            (
                Fetched::Failed("boom".to_string()),
                Fetched::Present(selector("app=test")),
                selector("app=test"),
                None,
            ),
            (
                Fetched::Present(selector("app=test1")),
                Fetched::Present(selector("app=test2")),
                Selector::nothing(),
                Some("Both targetRef and label selector defined. Please remove label selector"),
            ),
        ] {
            let res = resolve(&legacy, current.clone());
            assert_eq!(
                res.selector, expected,
                "legacy={legacy:?} current={current:?}"
            );
            assert_eq!(res.unsupported_reason(), reason);
            assert_eq!(res.selector.is_nothing(), reason.is_some());
            assert!(!res.conditions.contains(ConditionKind::ConfigDeprecated));
            assert!(res.conditions.len() <= 1);
        }
    }
}
