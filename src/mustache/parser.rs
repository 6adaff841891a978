use crate::mustache::error::{Error, Result};
use crate::mustache::scanner::Scanner;
use crate::mustache::token::{Tags, Token};
use regex::Regex;
use std::sync::LazyLock;

// 带 `^` 的版本只供 Scanner::scan 使用，失败时不必扫完整个 tail
static WHITE_AT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*").unwrap());
static EQUALS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*=").unwrap());
static EQUALS_AT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*=").unwrap());
static CURLY_AT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\}").unwrap());
static TAG_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#|\^|/|>|\{|&|=|!)").unwrap());

/// 标签类型，由开口分隔符后的符号决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Name,
    Unescaped,
    Section,
    Inverted,
    Close,
    Partial,
    Comment,
    Delimiters,
}

impl TagKind {
    fn from_sigil(sigil: &str) -> Self {
        match sigil {
            "#" => Self::Section,
            "^" => Self::Inverted,
            "/" => Self::Close,
            ">" => Self::Partial,
            "{" | "&" => Self::Unescaped,
            "=" => Self::Delimiters,
            "!" => Self::Comment,
            _ => Self::Name,
        }
    }
}

/// 扫描阶段的扁平 Token，注释、分隔符与闭合标签只存在于这一阶段
#[derive(Debug)]
enum RawToken {
    Text {
        text: String,
        start: usize,
        end: usize,
    },
    Tag {
        kind: TagKind,
        key: String,
        start: usize,
        end: usize,
    },
    Partial {
        key: String,
        start: usize,
        end: usize,
        indentation: String,
        tag_index: usize,
        line_has_non_space: bool,
    },
}

/// 由当前分隔符编译出的正则，分隔符变化时整体替换
struct TagPatterns {
    opening: Regex,
    opening_at: Regex,
    closing: Regex,
    closing_at: Regex,
    closing_curly: Regex,
}

impl TagPatterns {
    fn compile(tags: &Tags) -> Result<Self> {
        let opening = format!(r"{}\s*", regex::escape(&tags.open));
        let closing = format!(r"\s*{}", regex::escape(&tags.close));
        let closing_curly = format!(r"\s*\}}{}", regex::escape(&tags.close));
        Ok(Self {
            opening_at: Regex::new(&format!("^(?:{opening})"))?,
            opening: Regex::new(&opening)?,
            closing_at: Regex::new(&format!("^(?:{closing})"))?,
            closing: Regex::new(&closing)?,
            closing_curly: Regex::new(&closing_curly)?,
        })
    }
}

/// 当前行的扫描状态，遇到换行时重置
#[derive(Default)]
struct LineState {
    /// 本行空白字符 Token 的下标
    spaces: Vec<usize>,
    has_tag: bool,
    non_space: bool,
    line_has_non_space: bool,
    indentation: String,
    tag_index: usize,
}

impl LineState {
    /// 独立标签行：只有标签和空白时，删除本行所有空白 Token（含换行）
    fn strip_space(&mut self, tokens: &mut [Option<RawToken>]) {
        if self.has_tag && !self.non_space {
            for idx in self.spaces.drain(..) {
                tokens[idx] = None;
            }
        } else {
            self.spaces.clear();
        }
        self.has_tag = false;
        self.non_space = false;
    }

    fn new_line(&mut self) {
        self.indentation.clear();
        self.tag_index = 0;
        self.line_has_non_space = false;
    }
}

/// 将模板扫描为嵌套的 Token 树
///
/// 以 `你好，{{name}}！` 为例，得到 `[Text("你好，"), Name("name"), Text("！")]`；
/// `{{#a}}...{{/a}}` 之间的 Token 会收进区块的 children。
pub fn parse_template(template: &str, tags: &Tags) -> Result<Vec<Token>> {
    if template.is_empty() {
        return Ok(Vec::new());
    }

    let mut patterns = TagPatterns::compile(tags)?;
    let mut scanner = Scanner::new(template);
    let mut tokens: Vec<Option<RawToken>> = Vec::new();
    let mut sections: Vec<String> = Vec::new();
    let mut line = LineState::default();

    while !scanner.eos() {
        let mut start = scanner.pos();

        // 标签前的文本逐字符拆成 Token，方便之后按字符删除空白
        let value = scanner.scan_until(&patterns.opening);
        for chr in value.chars() {
            if chr.is_whitespace() {
                line.spaces.push(tokens.len());
                line.indentation.push(chr);
            } else {
                line.non_space = true;
                line.line_has_non_space = true;
                line.indentation.push(' ');
            }

            let end = start + chr.len_utf8();
            tokens.push(Some(RawToken::Text {
                text: chr.to_string(),
                start,
                end,
            }));
            start = end;

            if chr == '\n' {
                line.strip_space(&mut tokens);
                line.new_line();
            }
        }

        if scanner.scan(&patterns.opening_at).is_empty() {
            break;
        }

        line.has_tag = true;

        let sigil = scanner.scan(&TAG_AT_RE);
        scanner.scan(&WHITE_AT_RE);

        let kind = TagKind::from_sigil(sigil);
        let key = match sigil {
            "=" => {
                let value = scanner.scan_until(&EQUALS_RE);
                scanner.scan(&EQUALS_AT_RE);
                scanner.scan_until(&patterns.closing);
                value
            }
            "{" => {
                let value = scanner.scan_until(&patterns.closing_curly);
                scanner.scan(&CURLY_AT_RE);
                scanner.scan_until(&patterns.closing);
                value
            }
            _ => scanner.scan_until(&patterns.closing),
        };

        if scanner.scan(&patterns.closing_at).is_empty() {
            return Err(Error::syntax(
                format!("未闭合的标签，缺少 '{}'", closing_text(&patterns)),
                scanner.pos(),
                template,
            ));
        }

        let end = scanner.pos();
        let token = if kind == TagKind::Partial {
            RawToken::Partial {
                key: key.to_string(),
                start,
                end,
                indentation: line.indentation.clone(),
                tag_index: line.tag_index,
                line_has_non_space: line.line_has_non_space,
            }
        } else {
            RawToken::Tag {
                kind,
                key: key.to_string(),
                start,
                end,
            }
        };
        line.tag_index += 1;
        tokens.push(Some(token));

        match kind {
            TagKind::Section | TagKind::Inverted => sections.push(key.to_string()),
            TagKind::Close => match sections.pop() {
                None => {
                    return Err(Error::syntax(
                        format!("区块 \"{key}\" 没有对应的开始标签"),
                        start,
                        template,
                    ));
                }
                Some(open) if open != key => {
                    return Err(Error::syntax(
                        format!("区块 \"{open}\" 未闭合，遇到了 \"{key}\" 的结束标签"),
                        start,
                        template,
                    ));
                }
                Some(_) => {}
            },
            TagKind::Name | TagKind::Unescaped => line.non_space = true,
            TagKind::Delimiters => patterns = TagPatterns::compile(&Tags::parse(key)?)?,
            TagKind::Partial | TagKind::Comment => {}
        }
    }

    line.strip_space(&mut tokens);

    if let Some(open) = sections.pop() {
        return Err(Error::syntax(
            format!("区块 \"{open}\" 未闭合"),
            scanner.pos(),
            template,
        ));
    }

    Ok(nest_tokens(squash_tokens(tokens)))
}

fn closing_text(patterns: &TagPatterns) -> String {
    patterns
        .closing
        .as_str()
        .trim_start_matches(r"\s*")
        .replace('\\', "")
}

/// 合并相邻的文本 Token，跳过已被删除的空白
fn squash_tokens(tokens: Vec<Option<RawToken>>) -> Vec<RawToken> {
    let mut squashed: Vec<RawToken> = Vec::with_capacity(tokens.len());
    for token in tokens.into_iter().flatten() {
        if let RawToken::Text { text, end, .. } = &token
            && let Some(RawToken::Text {
                text: last_text,
                end: last_end,
                ..
            }) = squashed.last_mut()
        {
            last_text.push_str(text);
            *last_end = *end;
            continue;
        }
        squashed.push(token);
    }
    squashed
}

/// 尚在收集 children 的区块
struct OpenSection {
    key: String,
    inverted: bool,
    start: usize,
    body_start: usize,
    children: Vec<Token>,
}

/// 把区块之间的 Token 收进区块的 children，闭合标签的起点记为 body_end
fn nest_tokens(tokens: Vec<RawToken>) -> Vec<Token> {
    let mut nested = Vec::new();
    let mut stack: Vec<OpenSection> = Vec::new();

    for token in tokens {
        let finished = match token {
            RawToken::Text { text, start, end } => Token::Text { text, start, end },
            RawToken::Partial {
                key,
                start,
                end,
                indentation,
                tag_index,
                line_has_non_space,
            } => Token::Partial {
                key,
                start,
                end,
                indentation,
                tag_index,
                line_has_non_space,
            },
            RawToken::Tag {
                kind,
                key,
                start,
                end,
            } => match kind {
                TagKind::Name => Token::Name { key, start, end },
                TagKind::Unescaped => Token::Unescaped { key, start, end },
                TagKind::Section | TagKind::Inverted => {
                    stack.push(OpenSection {
                        key,
                        inverted: kind == TagKind::Inverted,
                        start,
                        body_start: end,
                        children: Vec::new(),
                    });
                    continue;
                }
                TagKind::Close => {
                    // 扫描阶段已校验过平衡，这里一定能弹出
                    let Some(open) = stack.pop() else { continue };
                    let OpenSection {
                        key,
                        inverted,
                        start: open_start,
                        body_start,
                        children,
                    } = open;
                    if inverted {
                        Token::Inverted {
                            key,
                            start: open_start,
                            body_start,
                            children,
                            body_end: start,
                        }
                    } else {
                        Token::Section {
                            key,
                            start: open_start,
                            body_start,
                            children,
                            body_end: start,
                        }
                    }
                }
                // 子模板在扫描阶段已是 RawToken::Partial
                TagKind::Partial | TagKind::Comment | TagKind::Delimiters => continue,
            },
        };

        match stack.last_mut() {
            Some(section) => section.children.push(finished),
            None => nested.push(finished),
        }
    }

    nested
}
