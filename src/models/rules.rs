//! Batch rules: the recognized options and the rule variant derived from them.

use serde::{Deserialize, Serialize};

/// Recognized options of a batch rules document.
///
/// Unknown fields are ignored so older services keep working when new options
/// are introduced. A value of 0 means "no limit" for both options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub maxpercustomer: i64,
    /// Window in days over which `maxpercustomer` is counted.
    #[serde(default)]
    pub timelimit: i64,
}

/// The rule a batch enforces at redemption time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Always admits. Selected for absent rules or `maxpercustomer == 0`.
    Unrestricted,
    /// Admits while the customer's usage count stays below `max`.
    /// `window_days == 0` counts all usage regardless of age.
    MaxPerCustomer { max: i64, window_days: i64 },
}

impl Rule {
    pub fn for_batch(rules: Option<&Rules>) -> Self {
        match rules {
            Some(rules) if rules.maxpercustomer > 0 => Rule::MaxPerCustomer {
                max: rules.maxpercustomer,
                window_days: rules.timelimit.max(0),
            },
            _ => Rule::Unrestricted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_zero() {
        let rules: Rules = serde_json::from_str("{}").unwrap();
        assert_eq!(rules.maxpercustomer, 0);
        assert_eq!(rules.timelimit, 0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let rules: Rules =
            serde_json::from_str(r#"{"maxpercustomer": 2, "timelimit": 7, "tier": "gold"}"#)
                .unwrap();
        assert_eq!(rules.maxpercustomer, 2);
        assert_eq!(rules.timelimit, 7);
    }

    #[test]
    fn absent_rules_are_unrestricted() {
        assert_eq!(Rule::for_batch(None), Rule::Unrestricted);
    }

    #[test]
    fn zero_max_is_unrestricted() {
        let rules = Rules {
            maxpercustomer: 0,
            timelimit: 30,
        };
        assert_eq!(Rule::for_batch(Some(&rules)), Rule::Unrestricted);
    }

    #[test]
    fn positive_max_selects_max_per_customer() {
        let rules = Rules {
            maxpercustomer: 1,
            timelimit: 30,
        };
        assert_eq!(
            Rule::for_batch(Some(&rules)),
            Rule::MaxPerCustomer {
                max: 1,
                window_days: 30
            }
        );
    }
}
