//! 项目级批量提取/写回测试
//!
//! 测试场景：
//! - 哈希索引跨运行保存，已有字符串的键不变
//! - 回退模式脚本的提取与原始文本写回
//! - 提取、翻译、写回的完整流程

use std::path::Path;

use gd_extractor::io::{DefaultTokenFileIo, TokenFileReader, TokenFileWriter};
use gd_extractor::{ExtractorConfig, HashIndexFile, Project, TranslateOutput};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn keys_of(path: &Path) -> Vec<(String, String)> {
    DefaultTokenFileIo
        .read(path)
        .unwrap()
        .into_iter()
        .map(|t| (t.original, t.key))
        .collect()
}

#[test]
fn test_keys_survive_across_runs() {
    let game = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index_path = out.path().join("hash_index.json");
    write(game.path(), "Events/Talk.gd", "func f():\n\tsay(\"First\")\n\tsay(\"Second\")\n");

    {
        let store = HashIndexFile::load(&index_path).unwrap();
        let project = Project::new(game.path(), ExtractorConfig::default()).unwrap();
        project.extract(out.path(), &store).unwrap();
        store.save().unwrap();
    }
    assert_eq!(
        keys_of(&out.path().join("Events/Talk.json")),
        vec![
            ("First".to_string(), "Talk_0".to_string()),
            ("Second".to_string(), "Talk_1".to_string()),
        ]
    );

    // 在前面插入新字符串，旧字符串的键保持不变
    write(
        game.path(),
        "Events/Talk.gd",
        "func f():\n\tsay(\"Zeroth\")\n\tsay(\"First\")\n\tsay(\"Second\")\n",
    );
    let store = HashIndexFile::load(&index_path).unwrap();
    let project = Project::new(game.path(), ExtractorConfig::default()).unwrap();
    project.extract(out.path(), &store).unwrap();

    assert_eq!(
        keys_of(&out.path().join("Events/Talk.json")),
        vec![
            ("Zeroth".to_string(), "Talk_2".to_string()),
            ("First".to_string(), "Talk_0".to_string()),
            ("Second".to_string(), "Talk_1".to_string()),
        ]
    );
}

#[test]
fn test_stale_index_entries_are_pruned() {
    let out = TempDir::new().unwrap();
    let index_path = out.path().join("hash_index.json");
    std::fs::write(
        &index_path,
        r#"{
  "Events/Talk.gd": { "counter": 1, "indexes": { "ABC": 0 } },
  "../Outside.gd": { "counter": 1, "indexes": { "DEF": 0 } },
  "Notes.txt": { "counter": 1, "indexes": { "GHI": 0 } }
}"#,
    )
    .unwrap();

    let store = HashIndexFile::load(&index_path).unwrap();
    assert_eq!(store.keys(), vec!["Events/Talk.gd"]);
    assert_eq!(store.get("Events/Talk.gd").lookup("ABC"), Some(0));
}

#[test]
fn test_fallback_script_round_trip() {
    let game = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(
        game.path(),
        "UI/ModsMenu.gd",
        "extends Control\n\nfunc _ready():\n\t$Title.text = \"x\"\n\tsay(\"Mods\")\n\nfunc _legacy():\n\tsay(\"Old\")\n",
    );

    let config = ExtractorConfig {
        discarded_functions: vec!["_legacy".to_string()],
        ..Default::default()
    };
    let store = HashIndexFile::new(out.path().join("hash_index.json"));
    let project = Project::new(game.path(), config).unwrap();

    let report = project.extract(out.path(), &store).unwrap();
    assert_eq!(report.written, 1);

    let token_path = out.path().join("UI/ModsMenu.json");
    let mut tokens = DefaultTokenFileIo.read(&token_path).unwrap();
    let originals: Vec<_> = tokens.iter().map(|t| t.original.as_str()).collect();
    assert_eq!(originals, vec!["Mods"]);

    tokens[0].translation = "模组".to_string();
    DefaultTokenFileIo.write(&tokens, &token_path).unwrap();

    let cache = TempDir::new().unwrap();
    let output = TranslateOutput::CacheDir(cache.path().to_path_buf());
    let report = project.translate(out.path(), &output, &store).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(
        std::fs::read_to_string(cache.path().join("UI/ModsMenu.gd")).unwrap(),
        "extends Control\n\nfunc _ready():\n\t$Title.text = \"x\"\n\tsay(\"模组\")\n\nfunc _legacy():\n\tsay(\"Old\")\n"
    );
}

#[test]
fn test_extract_translate_end_to_end() {
    let game = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(
        game.path(),
        "Scenes/Intro.gd",
        "extends Node\n\nfunc _ready():\n\tsaynn(\"Hello, \" + name)\n\tsay(\"Goodbye\")\n",
    );
    write(game.path(), "Scenes/Intro.tscn", "[node name=\"L\" type=\"Label\"]\ntext = \"Title\"\n");

    let store = HashIndexFile::new(out.path().join("hash_index.json"));
    let project = Project::new(game.path(), ExtractorConfig::default()).unwrap();
    let report = project.extract(out.path(), &store).unwrap();
    assert_eq!(report.written, 2);
    assert!(out.path().join("Scenes/Intro.tscn.json").exists());

    let token_path = out.path().join("Scenes/Intro.json");
    let mut tokens = DefaultTokenFileIo.read(&token_path).unwrap();
    for token in &mut tokens {
        token.translation = match token.original.as_str() {
            "\"Hello, \" + name" => "\"你好，\" + name".to_string(),
            "Goodbye" => "再见".to_string(),
            _ => String::new(),
        };
    }
    DefaultTokenFileIo.write(&tokens, &token_path).unwrap();

    let report = project.translate(out.path(), &TranslateOutput::InPlace, &store).unwrap();
    assert_eq!(report.written, 1);
    assert!(!report.has_errors());
    assert_eq!(
        std::fs::read_to_string(game.path().join("Scenes/Intro.gd")).unwrap(),
        "extends Node\n\nfunc _ready():\n\tsaynn(\"你好，\" + name)\n\tsay(\"再见\")\n"
    );
    // 场景文件只提取不写回
    assert_eq!(
        std::fs::read_to_string(game.path().join("Scenes/Intro.tscn")).unwrap(),
        "[node name=\"L\" type=\"Label\"]\ntext = \"Title\"\n"
    );
}
