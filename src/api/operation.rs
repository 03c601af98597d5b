//! Logical operations and batch composition
//!
//! Several calls of the same operation can be folded into one physical
//! request. Keys whose value is identical in every set are sent once as
//! `<Name>.Shared.<key>`; all others as `<Name>.<n>.<key>` (1-based).

use crate::api::params::RequestParameters;
use std::borrow::Cow;
use std::collections::BTreeSet;
use thiserror::Error;

/// Operation name allowed to carry up to ten parameter sets
pub const ITEM_LOOKUP: &str = "ItemLookup";

const MAX_ITEM_LOOKUP_SETS: usize = 10;
const MAX_BATCH_SETS: usize = 2;

/// Reasons two operations cannot be combined
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Only operations of the same type can be combined ({left} != {right})")]
    NameMismatch { left: String, right: String },

    #[error("Cart operations cannot be combined ({0})")]
    NotCombinable(String),

    #[error("{name} supports at most {limit} operations per batch request (got {count})")]
    TooMany {
        name: String,
        limit: usize,
        count: usize,
    },
}

/// One or more logical calls of a single remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    sets: Vec<RequestParameters>,
}

impl Operation {
    pub fn new(name: impl Into<String>, params: RequestParameters) -> Self {
        Self {
            name: name.into(),
            sets: vec![params],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of logical calls folded into this operation
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Parameter sets in the order they were combined
    pub fn sets(&self) -> &[RequestParameters] {
        &self.sets
    }

    /// Physical parameters for this operation.
    ///
    /// A single set is returned as-is (borrowed); batches are rewritten into
    /// shared and indexed keys.
    pub fn parameters(&self) -> Cow<'_, RequestParameters> {
        if let [single] = self.sets.as_slice() {
            return Cow::Borrowed(single);
        }

        let keys: BTreeSet<&str> = self.sets.iter().flat_map(|set| set.keys()).collect();
        let mut params = RequestParameters::new();

        for key in keys {
            let values: Vec<_> = self.sets.iter().filter_map(|set| set.get(key)).collect();
            let shared = values.len() == self.sets.len()
                && values.windows(2).all(|pair| pair[0] == pair[1]);

            if shared {
                params.insert(format!("{}.Shared.{}", self.name, key), values[0].clone());
            } else {
                for (index, set) in self.sets.iter().enumerate() {
                    if let Some(value) = set.get(key) {
                        params.insert(format!("{}.{}.{}", self.name, index + 1, key), value.clone());
                    }
                }
            }
        }

        Cow::Owned(params)
    }

    /// Fold `other` into this operation.
    ///
    /// Fails without touching the network when the names differ, when either
    /// side is a cart operation, or when the batch would exceed its limit.
    pub fn combine(mut self, other: Operation) -> Result<Operation, CompositionError> {
        if self.name != other.name {
            return Err(CompositionError::NameMismatch {
                left: self.name,
                right: other.name,
            });
        }
        if self.name.contains("Cart") {
            return Err(CompositionError::NotCombinable(self.name));
        }

        let limit = if self.name == ITEM_LOOKUP {
            MAX_ITEM_LOOKUP_SETS
        } else {
            MAX_BATCH_SETS
        };
        let count = self.sets.len() + other.sets.len();
        if count > limit {
            return Err(CompositionError::TooMany {
                name: self.name,
                limit,
                count,
            });
        }

        self.sets.extend(other.sets);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::params::ParamValue;

    fn lookup(id: &str) -> Operation {
        Operation::new(
            ITEM_LOOKUP,
            RequestParameters::new().with("ItemId", id).with("IdType", "ASIN"),
        )
    }

    #[test]
    fn test_single_set_is_borrowed_unchanged() {
        let op = lookup("0976925524");
        let params = op.parameters();
        assert!(matches!(params, Cow::Borrowed(_)));
        assert!(std::ptr::eq(params.as_ref(), &op.sets()[0]));
        assert_eq!(params.text("ItemId"), Some("0976925524"));
    }

    #[test]
    fn test_shared_and_indexed_keys() {
        let op = lookup("0976925524").combine(lookup("80348287843")).unwrap();
        let params = op.parameters();

        assert_eq!(params.len(), 3);
        assert_eq!(params.text("ItemLookup.Shared.IdType"), Some("ASIN"));
        assert_eq!(params.text("ItemLookup.1.ItemId"), Some("0976925524"));
        assert_eq!(params.text("ItemLookup.2.ItemId"), Some("80348287843"));
        assert_eq!(params.keys().filter(|k| k.contains(".Shared.")).count(), 1);
    }

    #[test]
    fn test_key_missing_from_one_set_is_indexed() {
        let a = Operation::new(
            "ItemSearch",
            RequestParameters::new().with("SearchIndex", "Books").with("Keywords", "rust"),
        );
        let b = Operation::new(
            "ItemSearch",
            RequestParameters::new().with("SearchIndex", "Books"),
        );
        let op = a.combine(b).unwrap();
        let params = op.parameters();

        assert_eq!(params.text("ItemSearch.Shared.SearchIndex"), Some("Books"));
        assert_eq!(params.text("ItemSearch.1.Keywords"), Some("rust"));
        assert!(!params.contains_key("ItemSearch.2.Keywords"));
    }

    #[test]
    fn test_list_values_compared_whole() {
        let group = |g: &[&str]| ParamValue::from(g);
        let a = Operation::new(
            ITEM_LOOKUP,
            RequestParameters::new().with("ResponseGroup", group(&["Small", "Images"])),
        );
        let b = Operation::new(
            ITEM_LOOKUP,
            RequestParameters::new().with("ResponseGroup", group(&["Small"])),
        );
        let op = a.combine(b).unwrap();
        let params = op.parameters();
        assert!(params.contains_key("ItemLookup.1.ResponseGroup"));
        assert!(params.contains_key("ItemLookup.2.ResponseGroup"));
    }

    #[test]
    fn test_ten_item_lookups_allowed_eleven_rejected() {
        let mut op = lookup("0");
        for n in 1..10 {
            op = op.combine(lookup(&n.to_string())).unwrap();
        }
        assert_eq!(op.len(), 10);

        let err = op.combine(lookup("10")).unwrap_err();
        assert_eq!(
            err,
            CompositionError::TooMany {
                name: ITEM_LOOKUP.to_string(),
                limit: 10,
                count: 11,
            }
        );
    }

    #[test]
    fn test_other_operations_limited_to_two() {
        let search = || {
            Operation::new(
                "ItemSearch",
                RequestParameters::new().with("SearchIndex", "Books"),
            )
        };
        let op = search().combine(search()).unwrap();
        assert!(matches!(
            op.combine(search()),
            Err(CompositionError::TooMany { limit: 2, count: 3, .. })
        ));
    }

    #[test]
    fn test_cart_operations_rejected() {
        let cart = || Operation::new("CartAdd", RequestParameters::new().with("CartId", "1"));
        assert_eq!(
            cart().combine(cart()),
            Err(CompositionError::NotCombinable("CartAdd".to_string()))
        );
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let other = Operation::new("SimilarityLookup", RequestParameters::new());
        assert!(matches!(
            lookup("1").combine(other),
            Err(CompositionError::NameMismatch { .. })
        ));
    }
}
