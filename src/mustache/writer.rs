use crate::mustache::cache::{CacheKey, MemoryCache, TemplateCache};
use crate::mustache::context::Context;
use crate::mustache::error::{Error, Result};
use crate::mustache::escape::escape_html;
use crate::mustache::parser::parse_template;
use crate::mustache::partials::Partials;
use crate::mustache::token::{Tags, Token, TokenTree};
use crate::mustache::value::{Lambda, Value};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// 自定义转义函数
pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 单次渲染的配置
#[derive(Clone, Default)]
pub struct RenderConfig {
    /// 覆盖默认的 HTML 转义，None 表示使用 [`escape_html`]
    pub escape: Option<EscapeFn>,
    /// 覆盖 Writer 的默认分隔符
    pub tags: Option<Tags>,
    /// 区块与子模板的最大嵌套层级，None 表示不限制
    pub max_depth: Option<usize>,
}

impl RenderConfig {
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_escape<F>(mut self, escape: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.escape = Some(Arc::new(escape));
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// 不做任何转义
    pub fn raw() -> Self {
        Self::default().with_escape(str::to_string)
    }
}

impl From<Tags> for RenderConfig {
    fn from(tags: Tags) -> Self {
        Self::default().with_tags(tags)
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("escape", &self.escape.as_ref().map_or("default", |_| "custom"))
            .field("tags", &self.tags)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// 渲染器：持有默认分隔符与分词缓存，按 Token 类型输出模板
pub struct Writer {
    tags: Tags,
    cache: Option<Box<dyn TemplateCache>>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("tags", &self.tags)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self {
            tags: Tags::default(),
            cache: Some(Box::new(MemoryCache::new())),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 关闭分词缓存，每次 parse 都重新扫描
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            tracing::debug!("模板缓存已清空");
        }
    }

    /// 分词，优先取缓存；同一模板在不同分隔符下分别缓存
    pub fn parse(&self, template: &str, tags: Option<&Tags>) -> Result<TokenTree> {
        let tags = tags.unwrap_or(&self.tags);
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(parse_template(template, tags)?));
        };

        let key = CacheKey::new(template, tags);
        if let Some(tokens) = cache.get(&key) {
            tracing::trace!("模板缓存命中（{} 字节）", template.len());
            return Ok(tokens);
        }

        tracing::debug!("解析模板（{} 字节，分隔符 {}）", template.len(), tags);
        let tokens: TokenTree = Arc::new(parse_template(template, tags)?);
        cache.set(key, tokens.clone());
        Ok(tokens)
    }

    /// 以 view 作为根作用域渲染模板
    pub fn render(
        &self,
        template: &str,
        view: &Value,
        partials: Option<&dyn Partials>,
        config: Option<&RenderConfig>,
    ) -> Result<String> {
        let context = Context::new(view);
        self.render_in(template, &context, partials, config)
    }

    /// 在已有作用域上渲染模板，可在多次渲染间共享作用域
    pub fn render_in(
        &self,
        template: &str,
        context: &Context<'_>,
        partials: Option<&dyn Partials>,
        config: Option<&RenderConfig>,
    ) -> Result<String> {
        let default = RenderConfig::default();
        let renderer = Renderer {
            writer: self,
            partials,
            config: config.unwrap_or(&default),
        };
        let mut out = String::new();
        renderer.render_template(template, context, 0, &mut out)?;
        Ok(out)
    }

    /// 直接渲染 Token 序列。
    ///
    /// `original` 为 Token 所属的模板原文，高阶区块需要它截取区块文本；
    /// 传 None 时遇到高阶区块会返回 [`Error::Unsupported`]。
    pub fn render_tokens(
        &self,
        tokens: &[Token],
        context: &Context<'_>,
        partials: Option<&dyn Partials>,
        original: Option<&str>,
        config: Option<&RenderConfig>,
    ) -> Result<String> {
        let default = RenderConfig::default();
        let renderer = Renderer {
            writer: self,
            partials,
            config: config.unwrap_or(&default),
        };
        let mut out = String::new();
        renderer.render_tokens(tokens, context, original, 0, &mut out)?;
        Ok(out)
    }
}

/// 一次渲染调用内不变的参数
struct Renderer<'w> {
    writer: &'w Writer,
    partials: Option<&'w dyn Partials>,
    config: &'w RenderConfig,
}

impl Renderer<'_> {
    fn render_template(
        &self,
        template: &str,
        context: &Context<'_>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let tokens = self.writer.parse(template, self.config.tags.as_ref())?;
        self.render_tokens(&tokens, context, Some(template), depth, out)
    }

    fn render_tokens(
        &self,
        tokens: &[Token],
        context: &Context<'_>,
        original: Option<&str>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        for token in tokens {
            match token {
                Token::Text { text, .. } => out.push_str(text),
                Token::Name { key, .. } => self.escaped_value(key, context, out),
                Token::Unescaped { key, .. } => self.unescaped_value(key, context, out),
                Token::Section {
                    key,
                    body_start,
                    children,
                    body_end,
                    ..
                } => self.render_section(
                    key,
                    children,
                    (*body_start, *body_end),
                    context,
                    original,
                    depth,
                    out,
                )?,
                Token::Inverted { key, children, .. } => {
                    self.render_inverted(key, children, context, original, depth, out)?
                }
                Token::Partial {
                    key,
                    indentation,
                    tag_index,
                    line_has_non_space,
                    ..
                } => {
                    // 只有本行第一个标签且前面有缩进时才调整子模板缩进
                    let indent = (*tag_index == 0 && !indentation.is_empty())
                        .then_some((indentation.as_str(), *line_has_non_space));
                    self.render_partial(key, indent, context, depth, out)?
                }
            }
        }
        Ok(())
    }

    /// 进入下一层嵌套，超过 max_depth 时报错
    fn descend(&self, depth: usize) -> Result<usize> {
        let next = depth + 1;
        match self.config.max_depth {
            Some(max) if next > max => Err(Error::RecursionLimit(max)),
            _ => Ok(next),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_section(
        &self,
        key: &str,
        children: &[Token],
        (body_start, body_end): (usize, usize),
        context: &Context<'_>,
        original: Option<&str>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let value = context.lookup(key);
        if !value.is_truthy() {
            return Ok(());
        }

        match value.as_ref() {
            Value::Array(items) => {
                let depth = self.descend(depth)?;
                for item in items {
                    let frame = context.push_borrowed(item);
                    self.render_tokens(children, &frame, original, depth, out)?;
                }
            }
            Value::Object(_) | Value::String(_) | Value::Int(_) | Value::Float(_) => {
                let depth = self.descend(depth)?;
                let frame = context.push_borrowed(value.as_ref());
                self.render_tokens(children, &frame, original, depth, out)?;
            }
            Value::Lambda(Lambda::Section(section)) => {
                let Some(original) = original else {
                    return Err(Error::Unsupported(
                        "缺少原始模板，无法使用高阶区块".into(),
                    ));
                };
                let text = original.get(body_start..body_end).ok_or_else(|| {
                    Error::Unsupported(format!(
                        "区块 \"{key}\" 的偏移 {body_start}..{body_end} 超出原始模板范围"
                    ))
                })?;

                let sub_render = |template: &str| -> Result<String> {
                    let mut buf = String::new();
                    self.render_template(template, context, depth, &mut buf)?;
                    Ok(buf)
                };
                if let Some(rendered) = section(text, &sub_render)? {
                    out.push_str(&rendered);
                }
            }
            // true 等其他真值：在当前作用域渲染区块
            _ => self.render_tokens(children, context, original, depth, out)?,
        }
        Ok(())
    }

    fn render_inverted(
        &self,
        key: &str,
        children: &[Token],
        context: &Context<'_>,
        original: Option<&str>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let value = context.lookup(key);
        let empty_list = matches!(value.as_ref(), Value::Array(items) if items.is_empty());
        if !value.is_truthy() || empty_list {
            self.render_tokens(children, context, original, depth, out)?;
        }
        Ok(())
    }

    fn render_partial(
        &self,
        key: &str,
        indent: Option<(&str, bool)>,
        context: &Context<'_>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let Some(partials) = self.partials else {
            return Ok(());
        };
        let Some(partial) = partials.partial(key) else {
            return Ok(());
        };

        let depth = self.descend(depth)?;
        let template = match indent {
            Some((indentation, line_has_non_space)) => {
                Cow::Owned(indent_partial(&partial, indentation, line_has_non_space))
            }
            None => partial,
        };
        self.render_template(&template, context, depth, out)
    }

    fn escaped_value(&self, key: &str, context: &Context<'_>, out: &mut String) {
        let value = context.lookup(key);
        if value.is_null() {
            return;
        }
        let text = value.to_string();
        match &self.config.escape {
            // 默认转义下数字无需转义
            None if value.is_number() => out.push_str(&text),
            None => out.push_str(&escape_html(&text)),
            Some(escape) => out.push_str(&escape(&text)),
        }
    }

    fn unescaped_value(&self, key: &str, context: &Context<'_>, out: &mut String) {
        let value = context.lookup(key);
        if !value.is_null() {
            out.push_str(&value.to_string());
        }
    }
}

/// 按子模板标签所在行的缩进重排子模板。
///
/// 例如模板 ` {{>p}}`、子模板 `I\nLove\nU` 得到 ` I\n Love\n U`；
/// 标签前已有非空白字符时第一行不加缩进，例如 ` Hi,{{>p}}` 得到 `I\n    Love\n    U`。
pub fn indent_partial(partial: &str, indentation: &str, line_has_non_space: bool) -> String {
    let filtered: String = indentation
        .chars()
        .filter(|c| *c == ' ' || *c == '\t')
        .collect();

    partial
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if !line.is_empty() && (i > 0 || !line_has_non_space) {
                format!("{filtered}{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
