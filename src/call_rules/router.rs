use std::collections::HashMap;

use super::{CallRule, SkipArgs};
use crate::utils::Result;

/// 调用规则路由器 trait
///
/// 负责判断函数调用的哪些实参不是可翻译文本
pub trait CallRouter: Send + Sync + std::fmt::Debug {
    /// 获取被调用函数的规则
    ///
    /// # 参数
    /// - `callee`: 函数名（`a.b.connect(...)` 取 `connect`）
    ///
    /// # 返回
    /// - `Some(&CallRule)`: 该函数有特殊规则
    /// - `None`: 普通函数，所有实参都参与提取
    fn rule_for(&self, callee: &str) -> Option<&CallRule>;

    /// 整个调用是否都不提取
    fn is_denied(&self, callee: &str) -> bool {
        matches!(self.rule_for(callee), Some(CallRule { skip: SkipArgs::All, .. }))
    }

    /// 检查某个位置的实参是否应跳过
    ///
    /// # 参数
    /// - `callee`: 函数名
    /// - `index`: 实参下标（从 0 开始）
    /// - `argc`: 实参总数
    fn skipped_arg(&self, callee: &str, index: usize, argc: usize) -> bool {
        match self.rule_for(callee) {
            None => false,
            Some(rule) if argc < rule.min_args => true,
            Some(CallRule { skip: SkipArgs::All, .. }) => true,
            Some(CallRule { skip: SkipArgs::Leading(n), .. }) => index < *n,
        }
    }
}

/// 默认调用规则路由器实现
///
/// 使用 call_rules.json 中的数据提供路由功能
#[derive(Debug, Clone)]
pub struct DefaultCallRouter {
    rules: HashMap<String, CallRule>,
}

impl DefaultCallRouter {
    /// 创建新的默认路由器实例
    pub fn new(rules: HashMap<String, CallRule>) -> Self {
        Self { rules }
    }

    /// 从内置的 call_rules.json 创建默认路由器
    ///
    /// # 错误
    /// 如果 JSON 解析失败，返回错误
    pub fn from_embedded_data() -> Result<Self> {
        Ok(Self::new(super::load_call_rules()?))
    }
}

impl CallRouter for DefaultCallRouter {
    fn rule_for(&self, callee: &str) -> Option<&CallRule> {
        self.rules.get(callee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_router() -> DefaultCallRouter {
        let mut rules = HashMap::new();
        rules.insert("load".to_string(), CallRule { skip: SkipArgs::All, min_args: 0 });
        rules.insert("connect".to_string(), CallRule { skip: SkipArgs::Leading(3), min_args: 3 });
        DefaultCallRouter::new(rules)
    }

    #[test]
    fn test_rule_for() {
        let router = create_test_router();
        assert!(router.rule_for("load").is_some());
        assert!(router.rule_for("sayn").is_none());
    }

    #[test]
    fn test_skipped_arg() {
        let router = create_test_router();

        // 整体拒绝
        assert!(router.is_denied("load"));
        assert!(router.skipped_arg("load", 5, 6));

        // 前 3 个参数是信号名、目标和方法名
        assert!(router.skipped_arg("connect", 0, 4));
        assert!(router.skipped_arg("connect", 2, 4));
        assert!(!router.skipped_arg("connect", 3, 4));
        assert!(!router.is_denied("connect"));

        // 普通函数
        assert!(!router.skipped_arg("sayn", 0, 1));
    }

    #[test]
    fn test_short_call_is_skipped() {
        let router = create_test_router();
        // Godot 4 风格的 connect(callable) 不符合签名
        assert!(router.skipped_arg("connect", 0, 2));
        assert!(router.skipped_arg("connect", 1, 2));
    }

    #[test]
    fn test_from_embedded_data() {
        let router = DefaultCallRouter::from_embedded_data().unwrap();
        assert!(router.is_denied("get_node"));
        assert!(router.is_denied("Color"));
        assert!(router.skipped_arg("emit_signal", 0, 2));
        assert!(!router.skipped_arg("emit_signal", 1, 2));
    }
}
