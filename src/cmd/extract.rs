//! The `extract` subcommand.

use std::sync::Arc;

use clap::Args;
use futures::StreamExt as _;
use tokio::io::{AsyncWrite, AsyncWriteExt as _, BufWriter};

use crate::{
    batch::{self, BatchEvent, BatchStatus, CancelHandle},
    extract::ExtractorKind,
    job::{JobFile, UnitRecord},
    prelude::*,
    raster::{LoadOptions, load_document},
    ui::Ui,
};

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// Path to a job file naming the documents, regions and prompt.
    pub job_path: PathBuf,

    /// The output path to write JSONL results to. Defaults to stdout.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// The extraction backend to use.
    #[clap(long, value_enum, default_value_t = ExtractorKind::default())]
    pub extractor: ExtractorKind,

    #[clap(flatten)]
    pub load_options: LoadOptions,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let job = JobFile::load(&opts.job_path).await?;

    // Load every document up front, in the order the job lists them.
    let mut documents = Vec::with_capacity(job.documents.len());
    for path in &job.documents {
        documents.push(load_document(path, &opts.load_options).await?);
    }
    let documents = Arc::new(documents);

    let store = job.to_store()?;
    let units = batch::build_work_units(&documents, &store, job.mode());
    info!(units = units.len(), "starting extraction run");

    // Ctrl-C requests cancellation; the run stops at the next unit boundary.
    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let pb = ui.new_progress_bar("Extracting", units.len() as u64);
    let mut stream = batch::run(
        documents,
        units,
        opts.extractor.create(),
        job.prompt.clone(),
        cancel,
    )?;

    let mut wtr = create_writer(opts.output_path.as_deref()).await?;
    while let Some(event) = stream.next().await {
        match event {
            BatchEvent::UnitStarted { index, label, .. } => {
                pb.set_position(index as u64);
                pb.set_message(label.to_string());
            }
            BatchEvent::UnitCompleted(result) => {
                let record = UnitRecord::from(result);
                let line = serde_json::to_string(&record)
                    .context("failed to serialize output record")?;
                wtr.write_all(line.as_bytes())
                    .await
                    .context("failed to write output record")?;
                wtr.write_all(b"\n")
                    .await
                    .context("failed to write output record")?;
            }
            BatchEvent::Finished(status) => {
                wtr.flush().await.context("failed to flush output")?;
                pb.finish_and_clear();
                match status {
                    BatchStatus::Completed => {}
                    BatchStatus::Canceled => {
                        // Not an error; results written so far remain valid.
                        info!("extraction canceled");
                    }
                    BatchStatus::Failed { label, detail } => {
                        return Err(anyhow!("{label}: {detail}"));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Open the JSONL output, either a file or stdout.
async fn create_writer(
    output_path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match output_path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {:?}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}
