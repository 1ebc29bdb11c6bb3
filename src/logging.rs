//! 日志初始化
//!
//! 宿主启动时调用一次；默认级别 `info`，可用 `RUST_LOG` 覆盖。
//! 重复调用不会报错（测试中各用例都会调用）。

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
