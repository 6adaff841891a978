use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stache::config::StacheConfig;
use stache::{PartialsDir, RenderConfig, Tags, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "stache", about = "mustache 模板渲染工具", version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 渲染模板
    Render {
        /// 模板文件，`-` 表示从标准输入读取
        template: PathBuf,

        /// 视图数据（.json 或 .toml），`-` 表示从标准输入读取 JSON
        #[arg(long)]
        view: Option<PathBuf>,

        /// 局部模板目录（默认使用配置中的 partials.dir）
        #[arg(short, long)]
        partials: Option<PathBuf>,

        /// 分隔符，例如 "<% %>"
        #[arg(long)]
        tags: Option<String>,

        /// 关闭 HTML 转义
        #[arg(long)]
        raw: bool,

        /// 输出文件（默认标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 输出模板的 Token 树（JSON）
    Parse {
        /// 模板文件，`-` 表示从标准输入读取
        template: PathBuf,

        /// 分隔符，例如 "<% %>"
        #[arg(long)]
        tags: Option<String>,
    },

    /// 检查模板语法与局部模板引用
    Check {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 使用配置中的日志级别作为默认值
    let default_level = match &cli.command {
        Commands::Render { root, .. } | Commands::Check { root } => {
            StacheConfig::load(root).ok().map(|c| c.log.level)
        }
        Commands::Parse { .. } => None,
    };

    let default_level = default_level.as_deref().unwrap_or("info");

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Render {
            template,
            view,
            partials,
            tags,
            raw,
            output,
            root,
        } => {
            let config = StacheConfig::load_or_default(&root)?;
            let mut render_config = config.render_config()?;
            if let Some(tags) = tags {
                render_config.tags = Some(Tags::parse(&tags)?);
            }
            if raw {
                render_config.escape = RenderConfig::raw().escape;
            }

            let partials = match partials {
                Some(dir) => PartialsDir::new(dir, config.partials.extension.clone()),
                None => config.partials_dir(&root),
            };

            let source = read_input(&template)?;
            let view = load_view(view.as_deref())?;
            let rendered = stache::render(&source, &view, Some(&partials), Some(&render_config))?;

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent()
                        && !parent.as_os_str().is_empty()
                    {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("写入 {} 失败", path.display()))?;
                    tracing::info!("已写入 {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Parse { template, tags } => {
            let tags = tags.as_deref().map(Tags::parse).transpose()?;
            let source = read_input(&template)?;
            let tokens = stache::parse(&source, tags.as_ref())?;
            println!("{}", serde_json::to_string_pretty(tokens.as_slice())?);
        }
        Commands::Check { root } => {
            let result = stache::check::run(&root)?;

            for w in &result.warnings {
                tracing::warn!("{w}");
            }
            for e in &result.errors {
                tracing::error!("{e}");
            }

            if result.errors.is_empty() {
                tracing::info!("检查通过（{} 个警告）", result.warnings.len());
            } else {
                anyhow::bail!(
                    "检查未通过：{} 个错误，{} 个警告",
                    result.errors.len(),
                    result.warnings.len()
                );
            }
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("读取 {} 失败", path.display()))
}

/// 未指定视图时使用空对象
fn load_view(path: Option<&Path>) -> anyhow::Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };

    let content = read_input(path)?;
    let view = if path.extension().is_some_and(|ext| ext == "toml") {
        Value::from_toml_str(&content)?
    } else {
        Value::from_json_str(&content)?
    };
    Ok(view)
}

const fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit:  ",
        env!("STACHE_GIT_COMMIT"),
        "\nbuild:   ",
        env!("STACHE_BUILD_TIME"),
        "\ntarget:  ",
        env!("STACHE_BUILD_TARGET"),
        "\nprofile: ",
        env!("STACHE_BUILD_PROFILE"),
    )
}
