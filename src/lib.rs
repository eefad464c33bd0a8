pub mod classifier;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod dbscan;
mod engine;
mod error;
pub mod kmeans;
pub mod merge;
pub mod metrics;
pub mod naming;
pub mod record;
pub mod router;
pub mod sanitize;
pub mod search;
pub mod strategy;
pub mod utils;

pub use classifier::{Classifier, LinearClassifier, SharedClassifier};
pub use cluster::{CategoryClusters, ClusterDescriptor, ClusterQuality, ImageSummary};
pub use config::{ClusterOptions, Opts};
pub use engine::ClusterEngine;
pub use error::{Error, Result};
pub use record::ImageRecord;
