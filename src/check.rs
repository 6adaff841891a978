use crate::config::{CONFIG_FILE, StacheConfig};
use crate::mustache::{PartialsDir, Tags, Token, parser};
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct CheckResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// 检查项目：配置是否可解析、模板与局部模板是否有语法错误、引用的局部模板是否存在
pub fn run(project_root: &Path) -> Result<CheckResult> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let config = match StacheConfig::load_or_default(project_root) {
        Ok(cfg) => cfg,
        Err(e) => {
            errors.push(format!("{CONFIG_FILE} 解析失败: {e}"));
            return Ok(CheckResult { errors, warnings });
        }
    };

    let tags = match config.tags() {
        Ok(tags) => tags,
        Err(e) => {
            errors.push(format!("{CONFIG_FILE} 中的分隔符无效: {e}"));
            return Ok(CheckResult { errors, warnings });
        }
    };

    let partials = config.partials_dir(project_root);
    let mut referenced = BTreeSet::new();

    let templates_dir = config.templates_dir(project_root);
    if !templates_dir.exists() {
        errors.push(format!("模板目录 {}/ 不存在", config.templates.dir));
    } else {
        check_dir(
            &templates_dir,
            &config.templates.extension,
            &tags,
            &mut referenced,
            &mut errors,
        )?;
    }

    if !partials.root().exists() {
        if !referenced.is_empty() {
            warnings.push(format!("局部模板目录 {}/ 不存在", config.partials.dir));
        }
    } else {
        check_dir(
            partials.root(),
            &config.partials.extension,
            &tags,
            &mut referenced,
            &mut errors,
        )?;
    }

    check_partial_refs(&partials, &referenced, &mut warnings);

    Ok(CheckResult { errors, warnings })
}

fn check_dir(
    dir: &Path,
    extension: &str,
    tags: &Tags,
    referenced: &mut BTreeSet<String>,
    errors: &mut Vec<String>,
) -> Result<()> {
    let mut files = Vec::new();
    collect_files(dir, extension, &mut files)?;
    files.sort();

    for path in files {
        let name = path.strip_prefix(dir)?.to_string_lossy().to_string();
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                errors.push(format!("读取 {name} 失败: {e}"));
                continue;
            }
        };

        match parser::parse_template(&source, tags) {
            Ok(tokens) => collect_partial_refs(&tokens, referenced),
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }
    Ok(())
}

fn collect_files(current_dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(current_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_files(&path, extension, files)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    Ok(())
}

fn collect_partial_refs(tokens: &[Token], referenced: &mut BTreeSet<String>) {
    for token in tokens {
        if let Token::Partial { key, .. } = token {
            referenced.insert(key.clone());
        }
        collect_partial_refs(token.children(), referenced);
    }
}

fn check_partial_refs(
    partials: &PartialsDir,
    referenced: &BTreeSet<String>,
    warnings: &mut Vec<String>,
) {
    for name in referenced {
        // 缺失的局部模板渲染时输出为空，因此只作为警告
        if !partials.path_of(name).is_file() {
            warnings.push(format!("局部模板 {name} 不存在"));
        }
    }
}
