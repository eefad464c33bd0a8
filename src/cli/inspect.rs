use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, load_records};
use crate::classifier::SharedClassifier;
use crate::config::Opts;
use crate::record::coalesce;
use crate::sanitize::run_dimension;

#[derive(Parser, Debug, Clone)]
pub struct InspectCommand {
    /// JSON 格式的图片记录
    pub input: PathBuf,
    /// 展示的样例数量
    #[arg(long, default_value_t = 3)]
    pub samples: usize,
}

impl SubCommandExtend for InspectCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let records = load_records(&self.input)?;
        let unique = coalesce(&records);

        let mut lengths = BTreeMap::new();
        for len in unique.iter().filter_map(|r| r.embedding.as_ref()).map(Vec::len) {
            *lengths.entry(len).or_insert(0usize) += 1;
        }
        let with_embedding = lengths.values().sum::<usize>();

        println!("records: {} ({} unique)", records.len(), unique.len());
        println!("with embedding: {with_embedding}");
        println!("without embedding: {}", unique.len() - with_embedding);
        match run_dimension(unique.iter().map(|r| r.embedding.as_deref())) {
            Some(dim) => println!("dimension: {dim}"),
            None => println!("dimension: -"),
        }
        for (len, count) in &lengths {
            println!("\tlength {len}: {count}");
        }

        println!("samples:");
        for record in unique.iter().take(self.samples) {
            let dim = record.embedding.as_ref().map(Vec::len).unwrap_or(0);
            println!("\t{}\t{}\t{dim}", record.path, record.display_caption());
        }

        let classifier = SharedClassifier::new(opts.conf_dir.classifier());
        match classifier.get() {
            Some(c) => println!(
                "classifier: {} ({} labels, dim {})",
                classifier.path().display(),
                c.labels().len(),
                c.dim()
            ),
            None => println!("classifier: not loaded ({})", classifier.path().display()),
        }
        Ok(())
    }
}
