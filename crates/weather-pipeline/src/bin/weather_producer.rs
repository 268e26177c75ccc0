use argh::FromArgs;
use std::path::PathBuf;

use weather_pipeline::pipeline::{Pipeline, PipelineError, EXIT_SETUP};
use weather_pipeline::shutdown::setup_shutdown;
use weather_pipeline::Config;

#[derive(FromArgs)]
/// Fetch the Open-Meteo hourly forecast and publish one record per hour to a broker topic
struct Args {
    /// path to a YAML configuration file (optional, defaults and environment otherwise)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// fetch and print the events without publishing
    #[argh(switch)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(EXIT_SETUP);
        }
    };

    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    let (_shutdown_tx, shutdown_rx) = setup_shutdown()?;

    if args.dry_run {
        return match pipeline.fetch(&shutdown_rx).await {
            Ok(payload) => {
                for event in payload.events() {
                    println!("{}", serde_json::to_string(&event)?);
                }
                log::info!("Dry run: {} events not published", payload.len());
                Ok(())
            }
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(e.exit_code());
            }
        };
    }

    match pipeline.run(shutdown_rx).await {
        Ok(report) => {
            log::info!(
                "Published {} events to '{}'",
                report.acknowledged,
                pipeline.config().broker.topic
            );
            Ok(())
        }
        Err(e) => {
            log::error!("{}", e);
            if let PipelineError::Publish(publish_err) = &e {
                if let Some(report) = publish_err.report() {
                    log::error!(
                        "{} of {} events acknowledged",
                        report.acknowledged,
                        report.attempted
                    );
                    for (index, reason) in &report.failed {
                        log::error!("  event {}: {}", index, reason);
                    }
                }
            }
            std::process::exit(e.exit_code());
        }
    }
}
