use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use streamcopy_rs::{
    cli,
    config::Config,
    error::Severity,
    observer::CopyEvent,
    resource::{ResourceDir, ResourceLocator},
    session,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args()?;
    let cfg = Config::load(&args.config_file)
        .await
        .with_context(|| format!("load config {}", args.config_file))?;

    if args.config_test {
        info!("config file {} is valid", args.config_file);
        return Ok(());
    }

    let bundle = ResourceDir::new(&cfg.resources);
    info!(
        "copying {}.{} from {} to {}",
        cfg.resource,
        cfg.extension,
        bundle.root().display(),
        bundle.output_path(&cfg.resource).display()
    );
    let mut handle = session::copy_resource(
        &bundle,
        &cfg.resource,
        &cfg.extension,
        &cfg.io_params,
        &Handle::current(),
    );

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling copy");
            token.cancel();
        }
    });

    let mut failed = false;
    while let Some(event) = handle.next_event().await {
        match event {
            CopyEvent::Progress(p) => {
                info!("received {} bytes, {} total", p.chunk.len(), p.total);
                debug!("{}", String::from_utf8_lossy(&p.chunk));
            }
            CopyEvent::Error(r) if r.severity == Severity::Warning => {
                warn!("{}: {}", r.kind, r.message)
            }
            CopyEvent::Error(r) => {
                error!("{}: {}", r.kind, r.message);
                failed = true;
            }
            CopyEvent::Complete => info!("copy complete"),
        }
    }

    let stats = handle.join().await;
    if args.report {
        println!("{}", serde_json::to_string(&stats)?);
    }
    if failed {
        anyhow::bail!("copy finished with errors");
    }
    Ok(())
}
