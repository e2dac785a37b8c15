//! Scan scope: which detector categories a scan runs.

use crate::{
    error::{ReconError, ReconResult},
    finding::Category,
};
use std::collections::BTreeSet;

/// Sentinel tag meaning every category.
pub const ALL_TAG: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanScope {
    #[default]
    All,
    Categories(BTreeSet<Category>),
}

impl ScanScope {
    /// Parse request tags. Empty input or any "all" tag selects everything;
    /// an unknown tag is rejected before any state is created.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> ReconResult<Self> {
        let mut categories = BTreeSet::new();
        let mut all = tags.is_empty();
        for tag in tags {
            let tag = tag.as_ref().trim().to_ascii_lowercase();
            if tag == ALL_TAG {
                all = true;
                continue;
            }
            let category = tag
                .parse::<Category>()
                .map_err(|_| ReconError::InvalidScope { tag: tag.clone() })?;
            categories.insert(category);
        }
        Ok(if all { Self::All } else { Self::Categories(categories) })
    }

    pub fn includes(&self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Categories(set) => set.contains(&category),
        }
    }

    /// Tags as stored on the scan run.
    pub fn tags(&self) -> Vec<String> {
        match self {
            Self::All => vec![ALL_TAG.to_string()],
            Self::Categories(set) => set.iter().map(|c| c.as_str().to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_all_select_everything() {
        let empty: [&str; 0] = [];
        assert_eq!(ScanScope::from_tags(&empty).unwrap(), ScanScope::All);
        assert_eq!(ScanScope::from_tags(&["fees", "ALL"]).unwrap(), ScanScope::All);
    }

    #[test]
    fn categories_are_case_insensitive() {
        let scope = ScanScope::from_tags(&[" Orders", "fees"]).unwrap();
        assert!(scope.includes(Category::Orders));
        assert!(scope.includes(Category::Fees));
        assert!(!scope.includes(Category::Balances));
        assert_eq!(scope.tags(), vec!["orders".to_string(), "fees".to_string()]);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = ScanScope::from_tags(&["orders", "payroll"]).unwrap_err();
        assert!(matches!(err, ReconError::InvalidScope { tag } if tag == "payroll"));
    }
}
