use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

/// 子模板来源：按名称返回子模板原文，None 表示不存在
pub trait Partials {
    fn partial(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl<S: BuildHasher> Partials for HashMap<String, String, S> {
    fn partial(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|s| Cow::Borrowed(s.as_str()))
    }
}

impl Partials for BTreeMap<String, String> {
    fn partial(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|s| Cow::Borrowed(s.as_str()))
    }
}

impl<F> Partials for F
where
    F: Fn(&str) -> Option<String>,
{
    fn partial(&self, name: &str) -> Option<Cow<'_, str>> {
        self(name).map(Cow::Owned)
    }
}

/// 从目录按 `<name>.<extension>` 读取子模板
#[derive(Debug, Clone)]
pub struct PartialsDir {
    root: PathBuf,
    extension: String,
}

impl PartialsDir {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 子模板名对应的文件路径
    pub fn path_of(&self, name: &str) -> PathBuf {
        let file = if self.extension.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{}", self.extension)
        };
        self.root.join(file)
    }
}

impl Partials for PartialsDir {
    fn partial(&self, name: &str) -> Option<Cow<'_, str>> {
        let path = self.path_of(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(Cow::Owned(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("子模板 {} 不存在：{}", name, path.display());
                None
            }
            Err(e) => {
                tracing::warn!("读取子模板 {} 失败：{}", path.display(), e);
                None
            }
        }
    }
}
