use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use indicatif::ProgressBar;
use log::info;

use crate::classifier::{LinearClassifier, TrainConfig, train_test_split};
use crate::cli::{SubCommandExtend, load_records};
use crate::config::Opts;
use crate::record::coalesce;
use crate::router::training_label;
use crate::sanitize::{check_embedding, run_dimension};
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct TrainCommand {
    /// JSON 格式的图片记录
    pub input: PathBuf,
    /// 训练轮数
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,
    /// 学习率
    #[arg(long, default_value_t = 0.5)]
    pub learning_rate: f32,
    /// L2 正则化系数
    #[arg(long, default_value_t = 1e-4)]
    pub l2: f32,
    /// 测试集比例
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f32,
    /// 划分训练集使用的随机种子
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// 向量标准差低于该值的记录不参与训练
    #[arg(long, value_name = "STD", default_value_t = 1e-6)]
    pub min_std: f32,
    /// 分类器保存路径，默认为配置目录下的 classifier.bin
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl SubCommandExtend for TrainCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let records = load_records(&self.input)?;
        let unique = coalesce(&records);
        let Some(dim) = run_dimension(unique.iter().map(|r| r.embedding.as_deref())) else {
            bail!("没有任何带向量的记录");
        };

        let samples = unique
            .iter()
            .filter_map(|r| {
                let embedding = check_embedding(r.embedding.as_deref(), dim, self.min_std).ok()?;
                Some((embedding, training_label(r)?))
            })
            .collect::<Vec<_>>();
        info!("{} 条记录中有 {} 条可用于训练，维度 {dim}", unique.len(), samples.len());
        if samples.len() < 2 {
            bail!("可用于训练的样本不足");
        }

        let (train, test) = train_test_split(samples.len(), self.test_size, self.seed);
        let train = train.into_iter().map(|i| samples[i]).collect::<Vec<_>>();
        let test = test.into_iter().map(|i| samples[i]).collect::<Vec<_>>();

        let conf =
            TrainConfig { epochs: self.epochs, learning_rate: self.learning_rate, l2: self.l2 };
        let pb = ProgressBar::new(self.epochs as u64).with_style(pb_style());
        let classifier = LinearClassifier::train(&train, &conf, |_, loss| {
            pb.set_message(format!("loss: {loss:.4}"));
            pb.inc(1);
        })?;
        pb.finish_and_clear();

        info!("训练集准确率：{:.2}%", classifier.accuracy(&train) * 100.0);
        if !test.is_empty() {
            info!("测试集准确率：{:.2}%", classifier.accuracy(&test) * 100.0);
        }

        let output = self.output.clone().unwrap_or_else(|| opts.conf_dir.classifier());
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        classifier.save(&output)?;
        info!("分类器已保存到 {}", output.display());
        Ok(())
    }
}
