//! `meshing`: build one mesh from filtered depth maps.
//!
//! Exit status is 0 on success or when help is requested, 1 otherwise.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cv_meshing::{
    init_thread_pool, DepthMapFolders, LatticeSurfaceEngine, MeshingConfig, MeshingJob,
    MeshingPipeline, PartitioningMode, Result,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

/// Large-scale meshing from filtered depth maps.
#[derive(Parser, Debug)]
#[command(name = "meshing", version)]
#[command(about = "Reconstructs a single mesh from depth maps under a track budget")]
struct Args {
    /// Configuration file.
    #[arg(long)]
    ini: PathBuf,

    /// Folder holding the cameras (`<id>_cam.txt`).
    #[arg(long = "depthMapFolder")]
    depth_map_folder: PathBuf,

    /// Folder holding the filtered depth and similarity maps.
    #[arg(long = "depthMapFilterFolder")]
    depth_map_filter_folder: PathBuf,

    /// Output mesh file (OBJ).
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of tracks per engine call.
    #[arg(long = "maxPts", default_value_t = 6_000_000)]
    max_pts: u64,

    /// Maximum number of tracks per voxel of the coarse grid.
    #[arg(long = "maxPtsPerVoxel", default_value_t = 6_000_000)]
    max_pts_per_voxel: u64,

    /// Partitioning: singleBlock or auto.
    #[arg(long, default_value = "singleBlock")]
    partitioning: String,
}

fn run(args: Args) -> Result<()> {
    let partitioning: PartitioningMode = args.partitioning.parse()?;

    let config = MeshingConfig::load(&args.ini)?;
    let settings = config.settings()?;

    let provider = DepthMapFolders::new(&args.depth_map_folder, &args.depth_map_filter_folder)
        .with_pixel_step(settings.pixel_step);

    let mut job = MeshingJob::new(&args.output);
    job.max_pts = args.max_pts;
    job.max_pts_per_voxel = args.max_pts_per_voxel;
    job.partitioning = partitioning;

    info!(
        ini = %args.ini.display(),
        output = %args.output.display(),
        max_pts = job.max_pts,
        max_pts_per_voxel = job.max_pts_per_voxel,
        %partitioning,
        "Meshing"
    );

    let pipeline = MeshingPipeline::new(settings, job);
    pipeline.run(&provider, &mut LatticeSurfaceEngine)?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if std::env::args_os().len() <= 1 {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let start = Instant::now();
    match init_thread_pool(None).and_then(|threads| {
        tracing::debug!(threads, "Thread pool ready");
        run(args)
    }) {
        Ok(()) => {
            info!(elapsed = ?start.elapsed(), "Task done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
