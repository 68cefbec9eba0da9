use serde::{Deserialize, Serialize};

use crate::model::ChainDefinition;

/// Filter and paging options for listing chains.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListQuery {
    /// substring matched against chain id and name
    pub keywords: Option<String>,
    pub root: Option<bool>,
    pub disabled: Option<bool>,
    /// page number, 1-based
    pub page: usize,
    /// page size, 0 returns every match
    pub size: usize,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keywords(
        mut self,
        keywords: impl Into<String>,
    ) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn root(
        mut self,
        root: bool,
    ) -> Self {
        self.root = Some(root);
        self
    }

    pub fn disabled(
        mut self,
        disabled: bool,
    ) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn page(
        mut self,
        page: usize,
        size: usize,
    ) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    pub(crate) fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }

    pub(crate) fn matches(
        &self,
        def: &ChainDefinition,
    ) -> bool {
        if let Some(keywords) = self.keywords.as_deref().filter(|k| !k.is_empty()) {
            if !def.id().contains(keywords) && !def.rule_chain.name.contains(keywords) {
                return false;
            }
        }
        self.root.is_none_or(|root| def.rule_chain.root == root) && self.disabled.is_none_or(|disabled| def.rule_chain.disabled == disabled)
    }
}
