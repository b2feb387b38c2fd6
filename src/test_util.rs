use std::sync::Once;

use log::LevelFilter;

static INIT: Once = Once::new();

/// 测试日志默认输出到 debug 级别，可以用 `RUST_LOG` 覆盖
pub(crate) fn setup() {
    INIT.call_once(|| {
        simple_logger::SimpleLogger::new().with_level(LevelFilter::Debug).env().init().unwrap();
    });
}
