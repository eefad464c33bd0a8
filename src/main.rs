use anyhow::Result;
use clap::Parser;
use imcluster::Opts;
use imcluster::cli::SubCommandExtend;
use imcluster::config::SubCommand;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Cluster(config) => config.run(&opts),
        SubCommand::Train(config) => config.run(&opts),
        SubCommand::Inspect(config) => config.run(&opts),
    }
}
