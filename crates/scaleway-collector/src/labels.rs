//! Typed label sets.
//!
//! Each gauge descriptor is parameterized by a [`LabelSet`]; an observation can only be built
//! from a value of that type, so label count and order always match the declared schema.

use std::fmt;

/// Set of label values attached to an observation.
///
/// Implement it with the [`label_set!`](crate::label_set) macro, which derives both the schema
/// and the value extraction from a single field list.
pub trait LabelSet: Clone + fmt::Debug + Send + Sync + 'static {
    /// Label names in exposition order.
    const NAMES: &'static [&'static str];

    /// Returns label values in the same order as [`Self::NAMES`].
    fn into_values(self) -> Vec<String>;
}

/// Empty label set for unlabeled gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoLabels;

impl LabelSet for NoLabels {
    const NAMES: &'static [&'static str] = &[];

    fn into_values(self) -> Vec<String> {
        Vec::new()
    }
}

/// Defines a struct with `String` fields implementing [`LabelSet`].
///
/// Each field is mapped to the exposition label name given after `=>`. Fields are documented
/// with the label name; extra field docs are appended to it.
///
/// # Examples
///
/// ```
/// use scaleway_collector::{label_set, labels::LabelSet};
///
/// label_set! {
///     /// Labels for a bucket.
///     pub struct BucketLabels {
///         name => "name",
///         region => "region",
///     }
/// }
///
/// assert_eq!(BucketLabels::NAMES, ["name", "region"]);
/// let labels = BucketLabels { name: "logs".into(), region: "fr-par".into() };
/// assert_eq!(labels.into_values(), ["logs", "fr-par"]);
/// ```
#[macro_export]
macro_rules! label_set {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            $(
                #[doc = concat!("Value of the `", $label, "` label.")]
                $(#[$field_meta])*
                pub $field: String,
            )+
        }

        impl $crate::labels::LabelSet for $name {
            const NAMES: &'static [&'static str] = &[$($label),+];

            fn into_values(self) -> Vec<String> {
                vec![$(self.$field),+]
            }
        }
    };
}

label_set! {
    /// Labels of per-node series (database and cache clusters).
    pub struct NodeLabels {
        id => "id",
        name => "name",
        /// Physical node the series was measured on.
        node => "node",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_values_follow_schema_order() {
        let labels = NodeLabels {
            id: "1f5c".to_owned(),
            name: "main-db".to_owned(),
            node: "node-0".to_owned(),
        };
        assert_eq!(NodeLabels::NAMES, ["id", "name", "node"]);
        assert_eq!(labels.into_values(), ["1f5c", "main-db", "node-0"]);
    }

    #[test]
    fn empty_label_set() {
        assert!(NoLabels::NAMES.is_empty());
        assert!(NoLabels.into_values().is_empty());
    }
}
