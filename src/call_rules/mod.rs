//! 调用参数过滤规则
//!
//! 负责判断哪些函数调用的实参是路径、信号名等非文本数据

mod data;
mod router;

pub use router::{CallRouter, DefaultCallRouter};
pub use data::{CallRule, SkipArgs};
pub(crate) use data::load_call_rules;
