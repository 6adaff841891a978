use crate::mustache::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// 区块 lambda 收到的子渲染器：以当前作用域渲染任意模板片段
pub type SubRender<'r> = dyn Fn(&str) -> Result<String> + 'r;

type GetterFn = dyn Fn(&Value) -> Value + Send + Sync;
type SectionFn = dyn Fn(&str, &SubRender<'_>) -> Result<Option<String>> + Send + Sync;

/// 视图中的可调用值
#[derive(Clone)]
pub enum Lambda {
    /// 插值型：每次查找时以所在作用域的视图为接收者调用，返回值作为查找结果
    Getter(Arc<GetterFn>),
    /// 区块型：接收区块原文与子渲染器，返回值原样输出
    Section(Arc<SectionFn>),
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter(_) => f.write_str("Lambda::Getter"),
            Self::Section(_) => f.write_str("Lambda::Section"),
        }
    }
}

impl PartialEq for Lambda {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Getter(a), Self::Getter(b)) => Arc::ptr_eq(a, b),
            (Self::Section(a), Self::Section(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// 渲染视图数据
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Lambda(Lambda),
}

impl Value {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::Lambda(Lambda::Getter(Arc::new(f)))
    }

    pub fn section<F>(f: F) -> Self
    where
        F: Fn(&str, &SubRender<'_>) -> Result<Option<String>> + Send + Sync + 'static,
    {
        Self::Lambda(Lambda::Section(Arc::new(f)))
    }

    /// 从任意可序列化的数据构造视图
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        serde_json::to_value(data)
            .map(Self::from)
            .map_err(|e| Error::invalid(format!("无法序列化视图数据：{e}")))
    }

    /// 解析 JSON 文本为视图
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str::<serde_json::Value>(s)
            .map(Self::from)
            .map_err(|e| Error::invalid(format!("JSON 视图解析失败：{e}")))
    }

    /// 解析 TOML 文档为视图
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str::<serde_json::Value>(s)
            .map(Self::from)
            .map_err(|e| Error::invalid(format!("TOML 视图解析失败：{e}")))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 按动态语言的真值规则判断：null、false、0、NaN、空串为假，空数组和空对象为真
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Lambda(_) => true,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// 运行时类型名，数组单独标注为 array
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Lambda(_) => "function",
        }
    }

    /// 对象或数组上是否存在该属性（数组支持下标与 length）
    pub fn has_property(&self, key: &str) -> bool {
        match self {
            Self::Object(map) => map.contains_key(key),
            Self::Array(items) => key == "length" || index_of(key).is_some_and(|i| i < items.len()),
            _ => false,
        }
    }

    /// 字符串这类原始值上是否存在下标或 length 属性
    pub fn primitive_has_property(&self, key: &str) -> bool {
        match self {
            Self::String(s) => {
                key == "length" || index_of(key).is_some_and(|i| i < s.chars().count())
            }
            _ => false,
        }
    }

    /// 可继续向下查找的子值，只有对象与数组元素能作为中间值
    pub fn child(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Array(items) => index_of(key).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// 读取属性值，包括数组与字符串的 length 及字符串的单个字符
    pub fn property(&self, key: &str) -> Option<Value> {
        match self {
            Self::Array(items) if key == "length" => Some(Self::Int(items.len() as i64)),
            Self::String(s) if key == "length" => Some(Self::Int(s.chars().count() as i64)),
            Self::String(s) => index_of(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Self::String(c.to_string())),
            _ => self.child(key).cloned(),
        }
    }
}

fn index_of(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// 数字按 JavaScript 的 String(n) 规则输出
fn format_float(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n != 0.0 && !(1e-6..1e21).contains(&n.abs()) {
        // 超出十进制范围时用指数形式，正指数带 `+`，例如 1e+21、1e-7
        let exp = format!("{n:e}");
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                write!(f, "{mantissa}e+{power}")
            }
            _ => f.write_str(&exp),
        }
    } else if n == n.trunc() {
        write!(f, "{}", n as i128)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null | Self::Lambda(_) => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => format_float(*n, f),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
