use regex::Regex;

/// 模板扫描器：在不可变的源字符串上移动游标，按正则收集片段。
///
/// 以 `你好，{{name}}！` 为例：
///
/// ```text
/// scan_until({{)  -> "你好，"
/// scan({{)        -> "{{"
/// scan_until(}})  -> "name"
/// scan(}})        -> "}}"
/// scan_until({{)  -> "！"，此后 eos() 为 true
/// ```
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// 当前相对源字符串的字节偏移
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// 尚未扫描的剩余部分
    pub fn tail(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub fn eos(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// 仅当 tail 开头匹配 `re` 时消费并返回匹配文本，否则返回空串且不移动游标。
    ///
    /// `re` 应以 `^` 锚定；未锚定的正则结果相同，但失败时会搜索整个 tail。
    pub fn scan(&mut self, re: &Regex) -> &'a str {
        let tail = self.tail();
        match re.find(tail) {
            Some(m) if m.start() == 0 => {
                let matched = &tail[..m.end()];
                self.pos += matched.len();
                matched
            }
            _ => "",
        }
    }

    /// 消费 `re` 首次出现之前的全部文本；没有出现时消费整个 tail
    pub fn scan_until(&mut self, re: &Regex) -> &'a str {
        let tail = self.tail();
        let skipped = match re.find(tail) {
            None => tail,
            Some(m) => &tail[..m.start()],
        };
        self.pos += skipped.len();
        skipped
    }
}
