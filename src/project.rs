//! 批量处理：扫描 Godot 项目，逐文件提取或写回

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::call_rules::{CallRouter, DefaultCallRouter};
use crate::config::ExtractorConfig;
use crate::hash_index::{HashIndex, HashIndexFile};
use crate::io::{DefaultTokenFileIo, TokenFileReader, TokenFileWriter};
use crate::scene::SceneFile;
use crate::script::ScriptFile;
use crate::utils::{create_backup, Result};
use crate::SUPPORTED_EXTENSIONS;

/// 写回结果的输出位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutput {
    /// 写到缓存目录（按相对路径镜像）
    CacheDir(PathBuf),
    /// 覆盖源文件，覆盖前创建带时间戳的备份
    InPlace,
}

/// 单个文件的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// 一次批量处理的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 成功处理的文件数
    pub processed: usize,
    /// 写出了文件的数量
    pub written: usize,
    /// 按配置跳过的文件
    pub skipped: Vec<PathBuf>,
    /// 处理失败的文件，不影响其他文件
    pub errors: Vec<FileError>,
}

impl BatchReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record(&mut self, path: PathBuf, outcome: Result<FileOutcome>) {
        match outcome {
            Ok(FileOutcome::Written) => {
                self.processed += 1;
                self.written += 1;
            }
            Ok(FileOutcome::Unchanged) => self.processed += 1,
            Ok(FileOutcome::Skipped) => self.skipped.push(path),
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                self.errors.push(FileError {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "处理 {} 个文件，写出 {} 个，跳过 {} 个，失败 {} 个",
            self.processed,
            self.written,
            self.skipped.len(),
            self.errors.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Written,
    Unchanged,
    Skipped,
}

/// 一个 Godot 项目目录
///
/// # 使用示例
/// ```rust,ignore
/// let store = HashIndexFile::load("hash_index.json")?;
/// let project = Project::new("game", ExtractorConfig::default())?;
/// let report = project.extract("out", &store)?;
/// println!("{}", report);
/// store.save()?;
/// ```
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: ExtractorConfig,
    router: Arc<dyn CallRouter>,
}

impl Project {
    /// 使用内置调用规则创建
    pub fn new(root: impl Into<PathBuf>, config: ExtractorConfig) -> Result<Self> {
        let router = Arc::new(DefaultCallRouter::from_embedded_data()?);
        Ok(Self::with_router(root, config, router))
    }

    pub fn with_router(
        root: impl Into<PathBuf>,
        config: ExtractorConfig,
        router: Arc<dyn CallRouter>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            router,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// 扫描项目内所有受支持的源文件，返回排序后的相对路径
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !self.config.is_excluded_dir(&entry.file_name().to_string_lossy())
        });

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !is_supported(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        log::info!("在 {} 中找到 {} 个源文件", self.root.display(), files.len());
        Ok(files)
    }

    /// 提取所有源文件的词条，按相对路径写到 `output_dir`
    ///
    /// 没有词条的文件不输出；`.gd` 对应 `.json`，`.tscn` 对应 `.tscn.json`。
    pub fn extract(&self, output_dir: impl AsRef<Path>, store: &HashIndexFile) -> Result<BatchReport> {
        let output_dir = output_dir.as_ref();
        let files = self.discover()?;
        store.clear_positions();

        let report = self.run(&files, |relative| self.extract_file(relative, output_dir, store));
        log::info!("提取完成: {}", report);
        Ok(report)
    }

    /// 把 `translations_dir` 中的译文写回脚本
    ///
    /// 场景文件只提取不写回；没有对应译文文件的脚本保持原样。
    pub fn translate(
        &self,
        translations_dir: impl AsRef<Path>,
        output: &TranslateOutput,
        store: &HashIndexFile,
    ) -> Result<BatchReport> {
        let translations_dir = translations_dir.as_ref();
        let scripts: Vec<PathBuf> = self
            .discover()?
            .into_iter()
            .filter(|p| has_extension(p, "gd"))
            .collect();
        store.clear_positions();

        let report = self.run(&scripts, |relative| {
            self.translate_file(relative, translations_dir, output, store)
        });
        log::info!("写回完成: {}", report);
        Ok(report)
    }

    fn run<F>(&self, files: &[PathBuf], process: F) -> BatchReport
    where
        F: Fn(&Path) -> Result<FileOutcome> + Sync,
    {
        let outcomes: Vec<(PathBuf, Result<FileOutcome>)> = if self.config.parallel {
            files
                .par_iter()
                .map(|relative| (relative.clone(), process(relative)))
                .collect()
        } else {
            files
                .iter()
                .map(|relative| (relative.clone(), process(relative)))
                .collect()
        };

        let mut report = BatchReport::default();
        for (path, outcome) in outcomes {
            report.record(path, outcome);
        }
        report
    }

    fn extract_file(&self, relative: &Path, output_dir: &Path, store: &HashIndexFile) -> Result<FileOutcome> {
        let stem = file_stem(relative);
        let is_script = has_extension(relative, "gd");
        if is_script && self.config.is_skipped(&stem) {
            log::debug!("跳过脚本: {}", relative.display());
            return Ok(FileOutcome::Skipped);
        }

        let content = std::fs::read_to_string(self.root.join(relative))?;
        let index = store.get(&relative_key(relative));
        let tokens = if is_script {
            self.parse_script(relative, &content, &stem, index)?.tokens().to_vec()
        } else {
            SceneFile::parse(relative, &content, &stem, index).tokens().to_vec()
        };

        if tokens.is_empty() {
            return Ok(FileOutcome::Unchanged);
        }
        let output_path = output_dir.join(token_file_path(relative));
        DefaultTokenFileIo.write(&tokens, &output_path)?;
        log::debug!("{} -> {} ({} 个词条)", relative.display(), output_path.display(), tokens.len());
        Ok(FileOutcome::Written)
    }

    fn translate_file(
        &self,
        relative: &Path,
        translations_dir: &Path,
        output: &TranslateOutput,
        store: &HashIndexFile,
    ) -> Result<FileOutcome> {
        let stem = file_stem(relative);
        if self.config.is_skipped(&stem) {
            return Ok(FileOutcome::Skipped);
        }

        let translation_path = translations_dir.join(token_file_path(relative));
        if !translation_path.exists() {
            return Ok(FileOutcome::Unchanged);
        }
        let translated = DefaultTokenFileIo.read(&translation_path)?;

        let source_path = self.root.join(relative);
        let content = std::fs::read_to_string(&source_path)?;
        let index = store.get(&relative_key(relative));
        let mut script = self.parse_script(relative, &content, &stem, index)?;

        let report = script.translate(&translated)?;
        for skipped in &report.skipped {
            log::warn!("{}: 未应用 {}: {}", relative.display(), skipped.key, skipped.reason);
        }
        if !report.changed {
            return Ok(FileOutcome::Unchanged);
        }

        match output {
            TranslateOutput::CacheDir(dir) => {
                let target = dir.join(relative);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&target, script.render())?;
            }
            TranslateOutput::InPlace => {
                let backup = create_backup(&source_path)?;
                log::debug!("已备份: {}", backup.display());
                std::fs::write(&source_path, script.render())?;
            }
        }
        log::debug!("{}: 应用 {} 处译文", relative.display(), report.applied.len());
        Ok(FileOutcome::Written)
    }

    fn parse_script(
        &self,
        relative: &Path,
        content: &str,
        stem: &str,
        index: Arc<HashIndex>,
    ) -> Result<ScriptFile> {
        if self.config.is_fallback(stem) {
            ScriptFile::parse_fallback_with_router(
                relative,
                content,
                stem,
                index,
                &self.config.discarded_functions,
                self.router.as_ref(),
            )
        } else {
            ScriptFile::parse_with_router(relative, content, stem, index, self.router.as_ref())
        }
    }
}

/// 把目录下的所有文件打包为 zip，返回写入的文件数
pub fn package_archive(dir: impl AsRef<Path>, archive: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    let archive = archive.as_ref();
    if let Some(parent) = archive.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && entry.path() != archive {
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();

    let mut zip = zip::ZipWriter::new(std::fs::File::create(archive)?);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for relative in &files {
        zip.start_file(relative_key(relative), options)?;
        zip.write_all(&std::fs::read(dir.join(relative))?)?;
    }
    zip.finish()?;

    log::info!("已打包 {} 个文件到 {}", files.len(), archive.display());
    Ok(files.len())
}

/// 源文件对应的词条文件相对路径
pub fn token_file_path(relative: &Path) -> PathBuf {
    if has_extension(relative, "tscn") {
        relative.with_extension("tscn.json")
    } else {
        relative.with_extension("json")
    }
}

/// 索引中使用的相对路径（分隔符统一为 `/`）
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn sample_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Scenes/Intro.gd", "func _ready():\n\tsay(\"Hello\")\n");
        write(dir.path(), "Scenes/Menu.tscn", "[node name=\"B\"]\ntext = \"Start\"\n");
        write(dir.path(), "Util/Math.gd", "func add(a, b):\n\treturn a + b\n");
        write(dir.path(), ".godot/Cache.gd", "func f():\n\tsay(\"cache\")\n");
        write(dir.path(), "icon.png", "png");
        dir
    }

    #[test]
    fn test_discover_skips_excluded_dirs() {
        let dir = sample_project();
        let project = Project::new(dir.path(), ExtractorConfig::default()).unwrap();
        let files = project.discover().unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("Scenes/Intro.gd"),
                PathBuf::from("Scenes/Menu.tscn"),
                PathBuf::from("Util/Math.gd"),
            ]
        );
    }

    #[test]
    fn test_token_file_path() {
        assert_eq!(token_file_path(Path::new("a/B.gd")), PathBuf::from("a/B.json"));
        assert_eq!(token_file_path(Path::new("a/B.tscn")), PathBuf::from("a/B.tscn.json"));
    }

    #[test]
    fn test_extract_writes_only_files_with_tokens() {
        let dir = sample_project();
        let out = TempDir::new().unwrap();
        let store = HashIndexFile::new(out.path().join("hash_index.json"));
        let project = Project::new(dir.path(), ExtractorConfig::default()).unwrap();

        let report = project.extract(out.path(), &store).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.written, 2);
        assert!(!report.has_errors());
        assert!(out.path().join("Scenes/Intro.json").exists());
        assert!(out.path().join("Scenes/Menu.tscn.json").exists());
        assert!(!out.path().join("Util/Math.json").exists());
        assert_eq!(store.keys(), vec!["Scenes/Intro.gd", "Scenes/Menu.tscn", "Util/Math.gd"]);
    }

    #[test]
    fn test_failing_file_does_not_abort_batch() {
        let dir = sample_project();
        write(dir.path(), "Broken.gd", "func f(:\n");
        let out = TempDir::new().unwrap();
        let store = HashIndexFile::new(out.path().join("hash_index.json"));
        let config = ExtractorConfig {
            parallel: true,
            ..Default::default()
        };
        let project = Project::new(dir.path(), config).unwrap();

        let report = project.extract(out.path(), &store).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, PathBuf::from("Broken.gd"));
        assert_eq!(report.written, 2);
    }

    #[test]
    fn test_skipped_scripts() {
        let dir = sample_project();
        let out = TempDir::new().unwrap();
        let store = HashIndexFile::new(out.path().join("hash_index.json"));
        let config = ExtractorConfig {
            skipped_scripts: vec!["Intro".to_string()],
            ..Default::default()
        };
        let project = Project::new(dir.path(), config).unwrap();

        let report = project.extract(out.path(), &store).unwrap();
        assert_eq!(report.skipped, vec![PathBuf::from("Scenes/Intro.gd")]);
        assert!(!out.path().join("Scenes/Intro.json").exists());
    }

    #[test]
    fn test_translate_in_place_creates_backup() {
        let dir = sample_project();
        let out = TempDir::new().unwrap();
        let store = HashIndexFile::new(out.path().join("hash_index.json"));
        let project = Project::new(dir.path(), ExtractorConfig::default()).unwrap();
        project.extract(out.path(), &store).unwrap();

        let token_path = out.path().join("Scenes/Intro.json");
        let mut tokens = DefaultTokenFileIo.read(&token_path).unwrap();
        tokens[0].translation = "你好".to_string();
        DefaultTokenFileIo.write(&tokens, &token_path).unwrap();

        let report = project.translate(out.path(), &TranslateOutput::InPlace, &store).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Scenes/Intro.gd")).unwrap(),
            "func _ready():\n\tsay(\"你好\")\n"
        );

        let backups: Vec<_> = std::fs::read_dir(dir.path().join("Scenes"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_translate_to_cache_dir() {
        let dir = sample_project();
        let out = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let store = HashIndexFile::new(out.path().join("hash_index.json"));
        let project = Project::new(dir.path(), ExtractorConfig::default()).unwrap();
        project.extract(out.path(), &store).unwrap();

        let token_path = out.path().join("Scenes/Intro.json");
        let mut tokens = DefaultTokenFileIo.read(&token_path).unwrap();
        tokens[0].translation = "你好".to_string();
        DefaultTokenFileIo.write(&tokens, &token_path).unwrap();

        let output = TranslateOutput::CacheDir(cache.path().to_path_buf());
        let report = project.translate(out.path(), &output, &store).unwrap();
        assert_eq!(report.written, 1);
        assert!(cache.path().join("Scenes/Intro.gd").exists());
        assert!(std::fs::read_to_string(dir.path().join("Scenes/Intro.gd"))
            .unwrap()
            .contains("Hello"));
    }

    #[test]
    fn test_package_archive() {
        let dir = sample_project();
        let archive_dir = TempDir::new().unwrap();
        let archive = archive_dir.path().join("out.zip");

        let count = package_archive(dir.path().join("Scenes"), &archive).unwrap();
        assert_eq!(count, 2);

        let file = std::fs::File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(zip.by_name("Intro.gd").is_ok());
    }

    #[test]
    fn test_report_display() {
        let report = BatchReport {
            processed: 3,
            written: 2,
            ..Default::default()
        };
        assert_eq!(report.to_string(), "处理 3 个文件，写出 2 个，跳过 0 个，失败 0 个");
    }
}
