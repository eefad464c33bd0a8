mod cluster;
mod inspect;
mod train;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
pub use cluster::*;
pub use inspect::*;
pub use train::*;

use crate::config::Opts;
use crate::record::ImageRecord;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> Result<()>;
}

/// 读取 JSON 数组格式的图片记录
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ImageRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("无法打开 {}", path.display()))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("无法解析 {}", path.display()))?;
    Ok(records)
}
