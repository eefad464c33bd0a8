use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use crate::cli::{SubCommandExtend, load_records};
use crate::cluster::CategoryClusters;
use crate::config::{ClusterOptions, Opts};
use crate::{ClusterEngine, SharedClassifier};

#[derive(Parser, Debug, Clone)]
pub struct ClusterCommand {
    #[command(flatten)]
    pub cluster: ClusterOptions,
    /// JSON 格式的图片记录
    pub input: PathBuf,
    /// 分类器文件，默认为配置目录下的 classifier.bin
    #[arg(long, value_name = "PATH")]
    pub classifier: Option<PathBuf>,
    /// 不使用分类器，只按关键词划分类别
    #[arg(long, conflicts_with = "classifier")]
    pub no_classifier: bool,
    /// 输出每个类别的聚类统计
    #[arg(long)]
    pub stats: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ClusterCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let records = load_records(&self.input)?;
        info!("读取 {} 条记录", records.len());

        let mut engine = ClusterEngine::new(self.cluster.clone());
        if !self.no_classifier {
            let path = self.classifier.clone().unwrap_or_else(|| opts.conf_dir.classifier());
            if let Some(classifier) = SharedClassifier::new(path).get() {
                engine = engine.with_classifier(classifier);
            }
        }

        let result = engine.run(&records);
        print_result(&result, self)
    }
}

fn print_result(result: &[CategoryClusters], opts: &ClusterCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            if opts.stats {
                let with_stats = result
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "category": c.category,
                            "clusters": c.clusters,
                            "statistics": c.statistics()
                        })
                    })
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&with_stats)?)
            } else {
                println!("{}", serde_json::to_string_pretty(result)?)
            }
        }
        OutputFormat::Table => {
            for category in result {
                println!("{} ({})", category.category, category.total());
                for cluster in &category.clusters {
                    println!(
                        "\t{}\t{}\t{:.2}\t{:.1}\t{}",
                        cluster.id,
                        cluster.name,
                        cluster.quality.coherence,
                        cluster.confidence,
                        cluster.len()
                    );
                }
                if opts.stats {
                    let stats = category.statistics();
                    println!(
                        "\tclusters: {}, avg: {:.2}, min: {}, max: {}, median: {:.1}, std: {:.2}, \
                         balance: {:.2}",
                        stats.total_clusters,
                        stats.avg_size,
                        stats.min,
                        stats.max,
                        stats.median,
                        stats.std,
                        stats.balance_score
                    );
                }
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
