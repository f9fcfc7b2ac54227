use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::Result;

/// 跳过哪些实参
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipArgs {
    /// 整个调用都不提取
    All,
    /// 跳过前 n 个位置参数（信号名、方法名等）
    Leading(usize),
}

/// 单个被调用函数的规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRule {
    pub skip: SkipArgs,
    /// 实参少于该数量时不符合已知签名，所有实参都跳过
    #[serde(default)]
    pub min_args: usize,
}

/// 加载调用规则表
///
/// 从内置的 call_rules.json 加载被调用函数名到规则的映射
///
/// # 返回
/// - `Ok(HashMap)`: 成功加载的规则表
/// - `Err`: JSON 解析失败
pub(crate) fn load_call_rules() -> Result<HashMap<String, CallRule>> {
    let json_data = include_str!("../../data/call_rules.json");
    Ok(serde_json::from_str(json_data)?)
}
