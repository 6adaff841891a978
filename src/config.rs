use crate::mustache::{PartialsDir, RenderConfig, Tags};
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "stache.toml";

#[derive(Debug, Default, Deserialize)]
pub struct StacheConfig {
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub templates: TemplatesSection,
    #[serde(default)]
    pub partials: PartialsSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize)]
pub struct RenderSection {
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub escape: EscapeMode,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    #[default]
    Html,
    None,
}

#[derive(Debug, Deserialize)]
pub struct TemplatesSection {
    #[serde(default = "default_templates_dir")]
    pub dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
pub struct PartialsSection {
    #[serde(default = "default_partials_dir")]
    pub dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl StacheConfig {
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("读取 {} 失败：{}", CONFIG_FILE, e))?;
        let config: StacheConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析 {} 失败：{}", CONFIG_FILE, e))?;
        Ok(config)
    }

    /// 配置文件不存在时使用默认值，存在但无法解析时仍然报错
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        if project_root.join(CONFIG_FILE).exists() {
            Self::load(project_root)
        } else {
            tracing::debug!("未找到 {}，使用默认配置", CONFIG_FILE);
            Ok(Self::default())
        }
    }

    pub fn tags(&self) -> Result<Tags> {
        Ok(Tags::from_slice(&self.render.tags)?)
    }

    /// 转换为单次渲染配置
    pub fn render_config(&self) -> Result<RenderConfig> {
        let mut config = match self.render.escape {
            EscapeMode::Html => RenderConfig::default(),
            EscapeMode::None => RenderConfig::raw(),
        };
        config.tags = Some(self.tags()?);
        config.max_depth = self.render.max_depth;
        Ok(config)
    }

    pub fn templates_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.templates.dir)
    }

    pub fn partials_dir(&self, project_root: &Path) -> PartialsDir {
        PartialsDir::new(project_root.join(&self.partials.dir), self.partials.extension.clone())
    }
}

// 默认值函数
fn default_tags() -> Vec<String> { vec!["{{".into(), "}}".into()] }
fn default_templates_dir() -> String { "templates".into() }
fn default_partials_dir() -> String { "partials".into() }
fn default_extension() -> String { "mustache".into() }
fn default_log_level() -> String { "info".into() }

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            tags: default_tags(),
            escape: EscapeMode::default(),
            max_depth: None,
        }
    }
}

impl Default for TemplatesSection {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
            extension: default_extension(),
        }
    }
}

impl Default for PartialsSection {
    fn default() -> Self {
        Self {
            dir: default_partials_dir(),
            extension: default_extension(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StacheConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.tags().unwrap(), Tags::default());
        assert_eq!(config.render.escape, EscapeMode::Html);
        assert_eq!(config.log.level, "info");
        assert!(StacheConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_load_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[render]
tags = ["<%", "%>"]
escape = "none"
max_depth = 8

[log]
level = "debug"
"#,
        )
        .unwrap();

        let config = StacheConfig::load(dir.path()).unwrap();
        assert_eq!(config.templates.dir, "templates");
        assert_eq!(config.log.level, "debug");

        let render = config.render_config().unwrap();
        assert_eq!(render.tags, Some(Tags::new("<%", "%>").unwrap()));
        assert_eq!(render.max_depth, Some(8));
        assert!(render.escape.is_some());
    }

    #[test]
    fn test_invalid_tags_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[render]\ntags = [\"<%\"]\n").unwrap();
        let config = StacheConfig::load(dir.path()).unwrap();
        assert!(config.render_config().is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[render\n").unwrap();
        assert!(StacheConfig::load_or_default(dir.path()).is_err());
    }
}
