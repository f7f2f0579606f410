//! CLI 模块负责解析命令行参数、组装结算服务并分发到各子命令。

mod runner;

pub mod args;
pub mod context;

pub use runner::run;
