//! GDScript / TSCN 提取与写回的端到端测试
//!
//! 测试场景：
//! - 同一文件重复提取结果一致，格式变化不影响指纹和键
//! - 相同上下文中的重复字符串合并为一个词条
//! - 拒绝列表、资源路径与空白字符串不产生词条
//! - 原文写回原文时源码不变
//! - 整句翻译只替换该语句

use std::sync::Arc;

use gd_extractor::{HashIndex, SceneFile, ScriptFile, TokenPosition, TranslationToken};

fn extract(source: &str) -> ScriptFile {
    ScriptFile::parse("Dialog.gd", source, "Dialog", Arc::new(HashIndex::new())).unwrap()
}

fn originals(file: &ScriptFile) -> Vec<&str> {
    file.tokens().iter().map(|t| t.original.as_str()).collect()
}

fn with_translations(file: &ScriptFile, pairs: &[(&str, &str)]) -> Vec<TranslationToken> {
    file.tokens()
        .iter()
        .filter_map(|t| {
            let (_, to) = pairs.iter().find(|(from, _)| *from == t.original)?;
            let mut t = t.clone();
            t.translation = to.to_string();
            Some(t)
        })
        .collect()
}

#[test]
fn test_extraction_is_deterministic() {
    let source = "extends Node\n\nfunc _ready():\n\tsay(\"Welcome\")\n\tif mood == \"sad\":\n\t\treturn \"Cheer up\"\n";
    let index = Arc::new(HashIndex::new());

    let first = ScriptFile::parse("A.gd", source, "A", Arc::clone(&index)).unwrap();
    let second = ScriptFile::parse("A.gd", source, "A", Arc::clone(&index)).unwrap();

    let ids = |f: &ScriptFile| -> Vec<(String, String)> {
        f.tokens().iter().map(|t| (t.key.clone(), t.hash_id())).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.tokens().len(), 3);
}

#[test]
fn test_reformatting_keeps_fingerprint_and_key() {
    let compact = "func f():\n\tsay(\"Hello\")\n";
    let spaced = "\n\n# 注释\nfunc f():\n    say(\"Hello\")\n";

    let a = extract(compact);
    let b = extract(spaced);
    assert_eq!(a.tokens()[0].hash_id(), b.tokens()[0].hash_id());
    assert_eq!(a.tokens()[0].key, b.tokens()[0].key);
    assert_ne!(a.tokens()[0].nodes, b.tokens()[0].nodes);
}

#[test]
fn test_same_text_and_context_is_one_token() {
    let file = extract("func f():\n\tsay(\"Hello\")\n\tsay(\"Hello\")\n");
    assert_eq!(file.tokens().len(), 1);
    assert_eq!(
        file.tokens()[0].nodes,
        vec![TokenPosition::new(2, 2, 6, 11), TokenPosition::new(3, 3, 6, 11)]
    );
}

#[test]
fn test_deny_list() {
    assert!(!extract("func f():\n\tget_node(\"Foo\")\n").has_tokens());

    let file = extract("func f():\n\tconnect(\"signal\", self, \"method\", [\"Extra\"])\n");
    assert_eq!(originals(&file), vec!["Extra"]);
}

#[test]
fn test_paths_and_blanks_are_excluded() {
    let file = extract(
        "var icon = \"res://a.png\"\nvar save = \"user://save.dat\"\n\nfunc f():\n\tsay(\"\")\n\tsay(\"   \")\n",
    );
    assert!(!file.has_tokens());
}

#[test]
fn test_no_op_translation_round_trip() {
    let source = "extends Node\n\nvar names = {\"bob\": \"Bob\", \"amy\": \"Amy\"}\n\nfunc talk():\n\tsaynn(\"Hi \" + names[\"bob\"])\n\tif GM.pc.hasPerk(\"Strong\"):\n\t\tsay(\"You flex.\")\n\treturn RNG.pick([\"A\", \"B\"])\n";
    let mut file = extract(source);
    let identity: Vec<_> = file
        .tokens()
        .iter()
        .map(|t| {
            let mut t = t.clone();
            t.translation = t.original.clone();
            t
        })
        .collect();

    let report = file.translate(&identity).unwrap();
    assert!(!report.changed);
    assert_eq!(file.render(), source);
}

#[test]
fn test_statement_translation_touches_only_that_line() {
    let source = "func intro():\n\tsay(\"Start\")\n\treturn RNG.pick([\"A\",\"B\"])\n\nfunc outro():\n\tsay(\"End\")\n";
    let mut file = extract(source);
    assert!(originals(&file).contains(&"return RNG.pick([\"A\",\"B\"])"));

    let translations = with_translations(
        &file,
        &[("return RNG.pick([\"A\",\"B\"])", "return RNG.pick([\"甲\",\"乙\"])")],
    );
    let report = file.translate(&translations).unwrap();

    assert!(report.changed);
    assert_eq!(
        file.render(),
        "func intro():\n\tsay(\"Start\")\n\treturn RNG.pick([\"甲\",\"乙\"])\n\nfunc outro():\n\tsay(\"End\")\n"
    );
}

#[test]
fn test_stale_and_missing_translations_are_ignored() {
    let source = "func f():\n\tsay(\"Hello\")\n";
    let mut file = extract(source);

    let stale = TranslationToken {
        key: "Dialog_0".to_string(),
        original: "Removed line".to_string(),
        translation: "已删除".to_string(),
        context: Some("say(\"Removed line\")".to_string()),
        ..Default::default()
    };
    let report = file.translate(&[stale]).unwrap();
    assert!(!report.changed);
    assert_eq!(file.render(), source);
}

#[test]
fn test_scene_text_scenario() {
    let scene = SceneFile::parse(
        "Title.tscn",
        "[node name=\"Start\" type=\"Button\" parent=\".\"]\ntext = \"Press Start\"\n",
        "Title",
        Arc::new(HashIndex::new()),
    );

    assert_eq!(scene.tokens().len(), 1);
    let token = &scene.tokens()[0];
    assert_eq!(token.original, "Press Start");
    assert_eq!(token.nodes, vec![TokenPosition::new(2, 2, 8, 19)]);
}
