use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use eb_config::PluginConfig;

use crate::{
    ContentSearcher, FullTextSearcher, KeywordSearcher, PluginSearcher, SearchContext, SearchError,
    Searcher, TitleSearcher,
};

/// Entry of the searchers listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearcherInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub brief: String,
}

/// Search strategies keyed by `searchType`.
#[derive(Default)]
pub struct SearcherRegistry {
    searchers: BTreeMap<String, Arc<dyn Searcher>>,
}

impl SearcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in strategies followed by the configured plugins.
    ///
    /// A plugin replaces a built-in of the same name. A disabled plugin
    /// removes it and registers nothing.
    pub fn with_defaults(
        ctx: &Arc<SearchContext>,
        fulltext: Arc<FullTextSearcher>,
        plugins: &[PluginConfig],
    ) -> Result<Self, SearchError> {
        let mut registry = Self::new();
        registry.register(Arc::new(TitleSearcher::new(Arc::clone(ctx))));
        registry.register(Arc::new(KeywordSearcher::new(Arc::clone(ctx))));
        registry.register(Arc::new(ContentSearcher::new(Arc::clone(ctx))));
        registry.register(fulltext);

        for plugin in plugins {
            if !plugin.enabled {
                if registry.remove(&plugin.name).is_some() {
                    tracing::info!(name = %plugin.name, "Search strategy disabled");
                }
                continue;
            }
            registry.register(Arc::new(PluginSearcher::new(plugin, Arc::clone(ctx))?));
            tracing::info!(name = %plugin.name, kind = ?plugin.kind, "Search plugin registered");
        }
        Ok(registry)
    }

    /// Add a searcher under its name, replacing any previous one.
    pub fn register(&mut self, searcher: Arc<dyn Searcher>) {
        self.searchers.insert(searcher.name().to_owned(), searcher);
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Searcher>> {
        self.searchers.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Searcher>> {
        self.searchers.get(name).cloned()
    }

    /// Registered strategies ordered by name.
    pub fn list(&self) -> Vec<SearcherInfo> {
        self.searchers
            .values()
            .map(|searcher| SearcherInfo {
                kind: searcher.name().to_owned(),
                brief: searcher.brief().to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blog;
    use eb_config::PluginKind;
    use pretty_assertions::assert_eq;

    fn plugin(name: &str, enabled: bool) -> PluginConfig {
        PluginConfig {
            name: name.to_owned(),
            brief: format!("{name} plugin"),
            kind: PluginKind::Command,
            command: "echo ${KEY_WORD}".to_owned(),
            enabled,
        }
    }

    fn names(registry: &SearcherRegistry) -> Vec<String> {
        registry.list().into_iter().map(|info| info.kind).collect()
    }

    #[test]
    fn test_defaults_registered_in_order() {
        let b = blog(&[], &[], &[]);
        let fulltext = Arc::new(FullTextSearcher::in_memory().unwrap());
        let registry = SearcherRegistry::with_defaults(&b.ctx, fulltext, &[]).unwrap();
        assert_eq!(names(&registry), vec!["content", "fulltext", "keyword", "title"]);
        assert!(registry.get("title").is_some());
        assert!(registry.get("grep").is_none());
    }

    #[test]
    fn test_plugins_added_replaced_and_disabled() {
        let b = blog(&[], &[], &[]);
        let fulltext = Arc::new(FullTextSearcher::in_memory().unwrap());
        let plugins = [plugin("grep", true), plugin("keyword", true), plugin("content", false), plugin("off", false)];
        let registry = SearcherRegistry::with_defaults(&b.ctx, fulltext, &plugins).unwrap();

        assert_eq!(names(&registry), vec!["fulltext", "grep", "keyword", "title"]);
        assert_eq!(registry.get("keyword").unwrap().brief(), "keyword plugin");
    }

    #[test]
    fn test_list_serializes_type_key() {
        let info = SearcherInfo {
            kind: "title".to_owned(),
            brief: "by name".to_owned(),
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"type":"title","brief":"by name"}"#
        );
    }
}
