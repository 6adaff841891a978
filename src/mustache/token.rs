use crate::mustache::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// 分词结果，经缓存共享
pub type TokenTree = Arc<Vec<Token>>;

/// 模板 Token，偏移均为原模板中的字节位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    /// 普通文本
    Text {
        text: String,
        start: usize,
        end: usize,
    },
    /// {{name}} 转义输出
    Name {
        key: String,
        start: usize,
        end: usize,
    },
    /// {{&name}} 或 {{{name}}} 不转义输出
    Unescaped {
        key: String,
        start: usize,
        end: usize,
    },
    /// {{#name}} ... {{/name}}
    Section {
        key: String,
        start: usize,
        body_start: usize,
        children: Vec<Token>,
        body_end: usize,
    },
    /// {{^name}} ... {{/name}}
    Inverted {
        key: String,
        start: usize,
        body_start: usize,
        children: Vec<Token>,
        body_end: usize,
    },
    /// {{>name}}
    Partial {
        key: String,
        start: usize,
        end: usize,
        /// 标签所在行、标签之前收集到的缩进
        indentation: String,
        /// 标签在所在行中的序号
        tag_index: usize,
        /// 标签之前该行是否出现过非空白字符
        line_has_non_space: bool,
    },
}

impl Token {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Name { key, .. }
            | Self::Unescaped { key, .. }
            | Self::Section { key, .. }
            | Self::Inverted { key, .. }
            | Self::Partial { key, .. } => Some(key),
        }
    }

    pub fn children(&self) -> &[Token] {
        match self {
            Self::Section { children, .. } | Self::Inverted { children, .. } => children,
            _ => &[],
        }
    }
}

/// 分隔符对，例如 ("{{", "}}")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tags {
    pub open: String,
    pub close: String,
}

impl Default for Tags {
    fn default() -> Self {
        Self {
            open: "{{".into(),
            close: "}}".into(),
        }
    }
}

impl Tags {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let tags = Self {
            open: open.into(),
            close: close.into(),
        };
        if tags.open.is_empty() || tags.close.is_empty() {
            return Err(Error::invalid(format!("分隔符不能为空：{tags}")));
        }
        Ok(tags)
    }

    /// 解析以空白分隔的分隔符描述，例如 `<% %>`，必须恰好两段
    pub fn parse(pair: &str) -> Result<Self> {
        let parts: Vec<&str> = pair.split_whitespace().collect();
        match parts.as_slice() {
            [open, close] => Self::new(*open, *close),
            _ => Err(Error::invalid(format!("无效的分隔符：{pair}"))),
        }
    }

    /// 从字符串列表构造，长度必须为 2
    pub fn from_slice<S: AsRef<str>>(parts: &[S]) -> Result<Self> {
        match parts {
            [open, close] => Self::new(open.as_ref(), close.as_ref()),
            _ => Err(Error::invalid(format!(
                "分隔符必须是两个元素，实际为 {} 个",
                parts.len()
            ))),
        }
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}
