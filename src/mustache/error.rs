use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// 调用方传入了错误的参数，例如非字符串模板或非法分隔符
    #[error("参数无效：{0}")]
    InvalidArgument(String),

    #[error("{}", format_error(*line, *col, context, message))]
    Syntax {
        /// 出错时扫描器所在的字节偏移
        pos: usize,
        line: usize,
        col: usize,
        message: String,
        context: String,
    },

    #[error("不支持的操作：{0}")]
    Unsupported(String),

    #[error("渲染嵌套层级超过上限 {0}")]
    RecursionLimit(usize),
}

fn format_error(line: usize, col: usize, context: &str, message: &str) -> String {
    let mut out = format!("模板语法错误\n  → {line}:{col}\n\n");
    if !context.is_empty() {
        out.push_str(context);
    }
    out.push_str(&format!("  错误：{message}"));
    out
}

impl Error {
    /// 根据模板源码与出错偏移创建语法错误，附带上下文行
    pub fn syntax(message: impl Into<String>, pos: usize, source: &str) -> Self {
        let (line, col) = line_col(source, pos);
        Self::Syntax {
            pos,
            line,
            col,
            message: message.into(),
            context: build_error_context(source, line),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// 语法错误的字节偏移，其他错误返回 None
    pub fn pos(&self) -> Option<usize> {
        match self {
            Self::Syntax { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Self::InvalidArgument(format!("无法编译分隔符：{e}"))
    }
}

/// 字节偏移换算为 1 起始的行列号
fn line_col(source: &str, pos: usize) -> (usize, usize) {
    let mut end = pos.min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    let before = &source[..end];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

fn build_error_context(source: &str, error_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = error_line.saturating_sub(3);
    let end = (error_line + 2).min(lines.len());

    let mut ctx = String::new();
    let width = format!("{}", end).len();
    for i in start..end {
        let marker = if i + 1 == error_line { ">" } else { " " };
        ctx.push_str(&format!(
            "  {} {:>width$} | {}\n",
            marker,
            i + 1,
            lines.get(i).unwrap_or(&""),
            width = width,
        ));
    }
    ctx
}
