//! Paratranz 平台客户端：构建并下载译文导出包

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::utils::{GdError, Result};

/// 导出包中 UTF-8 译文所在目录
const ARTIFACT_DIR: &str = "utf8/";

#[derive(Debug, Clone)]
pub struct ParatranzClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ParatranzClient {
    pub const BASE_URL: &'static str = "https://paratranz.cn/api/";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// 使用自定义的 API 地址
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| GdError::Http(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into(),
        })
    }

    fn url(&self, project: u64, tail: &str) -> String {
        format!(
            "{}/projects/{}/artifacts{}",
            self.base_url.trim_end_matches('/'),
            project,
            tail
        )
    }

    /// 触发服务端重新生成导出包
    pub fn build_artifact(&self, project: u64) -> Result<()> {
        let response = self
            .client
            .post(self.url(project, ""))
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .map_err(|e| GdError::Http(format!("构建导出包请求失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GdError::Http(format!("构建导出包失败 ({}): {}", status, body)));
        }
        log::info!("已请求构建项目 {} 的导出包", project);
        Ok(())
    }

    /// 下载导出包（zip）
    pub fn download_artifact(&self, project: u64) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(project, "/download"))
            .header("Authorization", &self.api_key)
            .send()
            .map_err(|e| GdError::Http(format!("下载导出包请求失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GdError::Http(format!("下载导出包失败 ({})", status)));
        }
        let bytes = response
            .bytes()
            .map_err(|e| GdError::Http(format!("读取导出包失败: {}", e)))?;
        log::info!("已下载项目 {} 的导出包 ({} 字节)", project, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// 解压导出包中 `utf8/` 下的文件到 `dest`，返回写出的文件路径
///
/// 条目路径去掉 `utf8/` 前缀；逃出目标目录的条目会被忽略。
pub fn unpack_artifact(bytes: &[u8], dest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dest = dest.as_ref();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry.enclosed_name() else {
            log::warn!("忽略不安全的条目: {}", entry.name());
            continue;
        };
        let Ok(relative) = name.strip_prefix(ARTIFACT_DIR) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        std::fs::write(&target, content)?;
        written.push(target);
    }

    log::info!("已解压 {} 个译文文件到 {}", written.len(), dest.display());
    Ok(written)
}
