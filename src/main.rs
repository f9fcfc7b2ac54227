use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gd_extractor::{
    package_archive, BatchReport, ExtractorConfig, HashIndexFile, Project, TranslateOutput,
};

#[derive(Parser)]
#[command(name = "gd_extractor")]
#[command(about = "从 Godot 项目（GDScript/TSCN）中提取可翻译字符串，并把译文写回")]
#[command(version = "0.1.0")]
struct Cli {
    /// 配置文件路径（JSON）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 静默模式(仅输出警告和错误)
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 提取词条为 Paratranz JSON 文件
    Extract {
        /// Godot 项目目录
        #[arg(short, long)]
        path: PathBuf,

        /// 词条文件输出目录
        #[arg(short, long)]
        output: PathBuf,

        /// 哈希索引文件（覆盖配置）
        #[arg(long)]
        index: Option<PathBuf>,

        /// 按文件并行处理
        #[arg(long)]
        parallel: bool,
    },

    /// 把译文写回脚本
    Translate {
        /// Godot 项目目录
        #[arg(short, long)]
        path: PathBuf,

        /// 输出目录；不指定时覆盖源文件（会先备份）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 译文目录（与提取输出的目录结构相同）
        #[arg(short, long)]
        translations: Option<PathBuf>,

        /// 哈希索引文件（覆盖配置）
        #[arg(long)]
        index: Option<PathBuf>,

        /// 按文件并行处理
        #[arg(long)]
        parallel: bool,

        /// 写回后把输出目录打包为 zip
        #[arg(long, requires = "output")]
        archive: Option<PathBuf>,

        /// 从 Paratranz 下载译文的项目 ID
        #[cfg(feature = "paratranz")]
        #[arg(long)]
        project: Option<u64>,

        /// Paratranz API 令牌
        #[cfg(feature = "paratranz")]
        #[arg(long, env = "PARATRANZ_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// 下载前先请求重新构建导出包
        #[cfg(feature = "paratranz")]
        #[arg(long, requires = "project")]
        build: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.quiet);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            path,
            output,
            index,
            parallel,
        } => handle_extract(config, &path, &output, index, parallel, cli.quiet),
        #[cfg(feature = "paratranz")]
        Commands::Translate {
            path,
            output,
            translations,
            index,
            parallel,
            archive,
            project,
            token,
            build,
        } => {
            let translations = match project {
                Some(project) => download_translations(project, token, build, translations)?,
                None => translations.context("需要 --translations 或 --project")?,
            };
            handle_translate(config, &path, output, &translations, index, parallel, archive, cli.quiet)
        }
        #[cfg(not(feature = "paratranz"))]
        Commands::Translate {
            path,
            output,
            translations,
            index,
            parallel,
            archive,
        } => {
            let translations = translations.context("需要 --translations")?;
            handle_translate(config, &path, output, &translations, index, parallel, archive, cli.quiet)
        }
    }
}

/// 初始化日志（`RUST_LOG` 优先）
fn init_logger(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ExtractorConfig> {
    match path {
        Some(path) => ExtractorConfig::load(path)
            .with_context(|| format!("无法加载配置文件: {}", path.display())),
        None => Ok(ExtractorConfig::default()),
    }
}

/// 处理提取模式
fn handle_extract(
    mut config: ExtractorConfig,
    path: &Path,
    output: &Path,
    index: Option<PathBuf>,
    parallel: bool,
    quiet: bool,
) -> Result<()> {
    validate_project_dir(path)?;
    config.parallel |= parallel;
    let index_path = index.unwrap_or_else(|| config.index_file.clone());

    let store = HashIndexFile::load(&index_path)
        .with_context(|| format!("无法加载哈希索引: {}", index_path.display()))?;

    if !quiet {
        println!("正在提取 {:?} 到 {:?}", path, output);
    }
    let project = Project::new(path, config)?;
    let report = project.extract(output, &store)?;
    store.save().context("保存哈希索引失败")?;

    print_report(&report, quiet);
    if !quiet {
        println!("哈希索引已保存到: {:?}", store.path());
    }
    Ok(())
}

/// 处理写回模式
#[allow(clippy::too_many_arguments)]
fn handle_translate(
    mut config: ExtractorConfig,
    path: &Path,
    output: Option<PathBuf>,
    translations: &Path,
    index: Option<PathBuf>,
    parallel: bool,
    archive: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    validate_project_dir(path)?;
    if !translations.is_dir() {
        bail!("译文目录不存在: {:?}", translations);
    }
    config.parallel |= parallel;
    let index_path = index.unwrap_or_else(|| config.index_file.clone());
    let store = HashIndexFile::load(&index_path)?;

    let target = match &output {
        Some(dir) => TranslateOutput::CacheDir(dir.clone()),
        None => TranslateOutput::InPlace,
    };
    if !quiet {
        match &target {
            TranslateOutput::CacheDir(dir) => println!("正在写回译文到 {:?}", dir),
            TranslateOutput::InPlace => println!("正在覆盖 {:?} 中的脚本（已备份原文件）", path),
        }
    }

    let project = Project::new(path, config)?;
    let report = project.translate(translations, &target, &store)?;
    print_report(&report, quiet);

    if let (Some(archive), Some(dir)) = (archive, output) {
        let count = package_archive(&dir, &archive)
            .with_context(|| format!("打包失败: {}", archive.display()))?;
        if !quiet {
            println!("已打包 {} 个文件到 {:?}", count, archive);
        }
    }
    Ok(())
}

/// 从 Paratranz 下载并解压译文
#[cfg(feature = "paratranz")]
fn download_translations(
    project: u64,
    token: Option<String>,
    build: bool,
    destination: Option<PathBuf>,
) -> Result<PathBuf> {
    use gd_extractor::paratranz::{unpack_artifact, ParatranzClient};

    let token = token.context("需要 --token 或环境变量 PARATRANZ_TOKEN")?;
    let destination = destination.unwrap_or_else(|| PathBuf::from("translations"));
    let client = ParatranzClient::new(token)?;

    if build {
        client.build_artifact(project)?;
    }
    let bytes = client.download_artifact(project)?;
    let files = unpack_artifact(&bytes, &destination)?;
    println!("已下载 {} 个译文文件到 {:?}", files.len(), destination);
    Ok(destination)
}

fn validate_project_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("项目目录不存在: {:?}", path);
    }
    Ok(())
}

fn print_report(report: &BatchReport, quiet: bool) {
    if !quiet {
        println!("{}", report);
        if !report.skipped.is_empty() {
            println!("跳过的文件:");
            for file in &report.skipped {
                println!("  {}", file.display());
            }
        }
    }
    if report.has_errors() {
        eprintln!("处理失败的文件:");
        for error in &report.errors {
            eprintln!("  {}: {}", error.path.display(), error.message);
        }
    }
}
