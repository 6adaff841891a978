use crate::mustache::token::{Tags, TokenTree};
use std::collections::HashMap;
use std::sync::RwLock;

/// 缓存键：模板原文与解析时生效的分隔符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template: String,
    pub tags: Tags,
}

impl CacheKey {
    pub fn new(template: &str, tags: &Tags) -> Self {
        Self {
            template: template.to_string(),
            tags: tags.clone(),
        }
    }
}

/// 模板分词结果缓存，可替换为自定义实现
pub trait TemplateCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<TokenTree>;
    fn set(&self, key: CacheKey, tokens: TokenTree);
    fn clear(&self);
}

/// 基于读写锁的内存缓存
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, TokenTree>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<TokenTree> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: CacheKey, tokens: TokenTree) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, tokens);
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}
