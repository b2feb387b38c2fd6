//! 数据模型：写入用的数据点，以及 Flux 查询结果

mod flux;
mod point;

pub use flux::*;
pub use point::*;
