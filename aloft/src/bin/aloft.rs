use aloft::config::{BatcherKind, Cli, Config, ExporterKind};
use aloft::Pipeline;
use clap::Parser;
use sensor_io::{Batcher, CliExporter, Exporter, FifoExporter, QueueBatcher, SqliteExporter, TableBatcher};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(&cli.config)?;

    let batcher: Box<dyn Batcher + Send> = match config.batcher {
        BatcherKind::Queue => {
            let path = cli
                .input
                .clone()
                .unwrap_or_else(|| "aloft_input.json".into());
            Box::new(QueueBatcher::new(path))
        }
        BatcherKind::Table => {
            tracing::warn!(
                "table batcher selected with no external row source wired into this binary; \
                 the pipeline will only see batches inserted out-of-process"
            );
            Box::new(TableBatcher::new(config.batch_window_tau))
        }
    };

    let exporter: Box<dyn Exporter + Send> = match config.exporter {
        ExporterKind::Cli => Box::new(CliExporter),
        ExporterKind::Sqlite => {
            let path = cli
                .output
                .clone()
                .unwrap_or_else(|| "aloft_output.sqlite3".into());
            Box::new(SqliteExporter::open(path)?)
        }
        ExporterKind::Fifo => {
            let path = cli
                .output
                .clone()
                .unwrap_or_else(|| "aloft_output.json".into());
            Box::new(FifoExporter::new(path))
        }
    };

    let mut pipeline = Pipeline::new(
        (config.grid.bottom_left[0], config.grid.bottom_left[1]),
        (config.grid.top_right[0], config.grid.top_right[1]),
        config.grid.height_m,
        config.grid.resolution,
        config.percentile,
        config.max_cluster_distance,
        config.max_cluster_age,
        batcher,
        exporter,
    )?;

    let cancel = std::sync::atomic::AtomicBool::new(false);
    aloft::run_loop(&mut pipeline, &cancel);

    Ok(())
}
