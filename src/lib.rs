//! mustache 模板引擎。
//!
//! 模板先经扫描器和分词器变成 Token 树（按模板与分隔符缓存），
//! 再由 [`Writer`] 结合作用域链渲染为字符串。
//!
//! ```
//! use stache::Value;
//!
//! let view = Value::from(serde_json::json!({"name": "Tom", "items": [1, 2]}));
//! let out = stache::render("{{name}}:{{#items}}[{{.}}]{{/items}}", &view, None, None).unwrap();
//! assert_eq!(out, "Tom:[1][2]");
//! ```

pub mod check;
pub mod config;
pub mod mustache;

pub use mustache::{
    Context, Error, Lambda, Partials, PartialsDir, RenderConfig, Result, SubRender, Tags, Token,
    TokenTree, Value, Writer,
};

use std::sync::LazyLock;

/// 进程级默认渲染器，持有共享的模板缓存
static DEFAULT_WRITER: LazyLock<Writer> = LazyLock::new(Writer::new);

/// 以默认分隔符 `{{ }}` 或给定分隔符解析模板
pub fn parse(template: &str, tags: Option<&Tags>) -> Result<TokenTree> {
    DEFAULT_WRITER.parse(template, tags)
}

/// 渲染模板
pub fn render(
    template: &str,
    view: &Value,
    partials: Option<&dyn Partials>,
    config: Option<&RenderConfig>,
) -> Result<String> {
    DEFAULT_WRITER.render(template, view, partials, config)
}

/// 渲染来自动态数据的模板，模板不是字符串时报错并给出实际类型
pub fn render_value(
    template: &Value,
    view: &Value,
    partials: Option<&dyn Partials>,
    config: Option<&RenderConfig>,
) -> Result<String> {
    match template {
        Value::String(template) => render(template, view, partials, config),
        other => Err(Error::InvalidArgument(format!(
            "模板必须是 \"string\"，实际传入的是 \"{}\"",
            other.type_name()
        ))),
    }
}

pub fn escape_html(s: &str) -> String {
    mustache::escape_html(s)
}

/// 清空默认渲染器的模板缓存
pub fn clear_cache() {
    DEFAULT_WRITER.clear_cache();
}
