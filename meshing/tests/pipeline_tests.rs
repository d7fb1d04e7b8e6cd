use cv_3d::spatial::Hexahedron;
use cv_core::geometry::{Camera, CameraExtrinsics, CameraIntrinsics};
use cv_io::binary::{self, ArtifactKind};
use cv_io::depth_map::{self, DepthMap};
use cv_io::TriangleMesh;
use cv_meshing::{
    BlockRequest, Dataset, DatasetProvider, DepthMapFolders, DepthSample, Error,
    LatticeSurfaceEngine, LocalMeshResult, MeshingConfig, MeshingJob, MeshingPipeline,
    MeshingSettings, PartitioningMode, PlanSource, ReconstructionEngine, ReconstructionPlan,
    Result,
};
use nalgebra::{Matrix3, Point3, Vector3};
use std::fs::{self, File};
use std::path::Path;
use tempfile::tempdir;

/// Two fronto-parallel 16x16 views of the plane `z = 5`, half a unit apart.
fn write_dataset(dir: &Path) {
    let intrinsics = CameraIntrinsics::new(20.0, 20.0, 8.0, 8.0, 16, 16);
    let cameras = [
        Camera::new(0, intrinsics, CameraExtrinsics::default()),
        Camera::new(
            1,
            intrinsics,
            CameraExtrinsics::new(Matrix3::identity(), Vector3::new(-0.5, 0.0, 0.0)),
        ),
    ];
    for camera in &cameras {
        let mut f = File::create(depth_map::camera_file(dir, camera.id)).unwrap();
        depth_map::write_camera(&mut f, camera).unwrap();
        let mut f = File::create(depth_map::depth_map_file(dir, camera.id)).unwrap();
        depth_map::write_depth_map(&mut f, &DepthMap::filled(16, 16, 5.0)).unwrap();
    }
}

fn settings(extra: &str) -> MeshingSettings {
    let text = format!("[largeScale]\ngridLevel0 = 16\nminGridLevel = 2\n{}", extra);
    text.parse::<MeshingConfig>().unwrap().settings().unwrap()
}

fn job(out: &Path, mode: PartitioningMode) -> MeshingJob {
    let mut job = MeshingJob::new(out.join("mesh.obj"));
    job.partitioning = mode;
    job
}

#[test]
fn test_single_block_run_writes_artifacts() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let pipeline = MeshingPipeline::new(
        settings("[delaunaycut]\nexportDebugGC = true\n"),
        job(out.path(), PartitioningMode::SingleBlock),
    );
    let summary = pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap();

    assert_eq!(summary.mode, PartitioningMode::SingleBlock);
    assert_eq!(summary.blocks, 1);
    assert_eq!(summary.resolution, 16);
    assert!(summary.vertices > 0);
    assert!(summary.plan_source.is_none());

    let mesh: TriangleMesh = binary::load_binary(
        &out.path().join("denseReconstruction.bin"),
        ArtifactKind::MeshSnapshot,
    )
    .unwrap();
    let cams: Vec<Vec<u32>> = binary::load_binary(
        &out.path().join("meshPtsCamsFromDGC.bin"),
        ArtifactKind::PointCameras,
    )
    .unwrap();
    assert_eq!(mesh.num_vertices(), summary.vertices);
    assert_eq!(cams.len(), mesh.num_vertices());
    // The consistency filter keeps only points seen by both views.
    assert!(cams.iter().all(|c| c == &vec![0, 1]));

    let obj = cv_io::load_obj(&out.path().join("mesh.obj")).unwrap();
    assert_eq!(obj.num_faces(), summary.faces);

    assert!(out
        .path()
        .join("meshColoredbyCamsConsistency_postprocess.ply")
        .exists());
    assert!(out
        .path()
        .join("meshColoredByVisibility_postprocess.ply")
        .exists());
    assert!(!out.path().join("tmp/root01024/hexahsToReconstruct.bin").exists());
}

#[test]
fn test_single_block_search_coarsens_to_budget() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let mut job = job(out.path(), PartitioningMode::SingleBlock);
    job.max_pts = 100;
    let pipeline = MeshingPipeline::new(settings(""), job);
    let summary = pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap();

    // 16 gives ~224 tracks (ratio >= 2), so the search halves once.
    assert_eq!(summary.resolution, 8);
    assert!(!out.path().join("meshColoredByVisibility_postprocess.ply").exists());
}

#[test]
fn test_exclusion_regions_are_removed() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let mut job = job(out.path(), PartitioningMode::SingleBlock);
    job.exclude = vec![Hexahedron::from_aabb(
        Point3::new(0.0, -10.0, 0.0),
        Point3::new(10.0, 10.0, 10.0),
    )];
    let pipeline = MeshingPipeline::new(settings(""), job);
    pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap();

    let mesh = cv_io::load_obj(&out.path().join("mesh.obj")).unwrap();
    assert!(mesh.num_vertices() > 0);
    assert!(mesh.vertices.iter().all(|v| v.x < 0.0));
}

#[test]
fn test_auto_run_reuses_cached_plan() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let mut job = job(out.path(), PartitioningMode::Auto);
    job.max_pts = 100;
    job.max_pts_per_voxel = 30;
    let pipeline = MeshingPipeline::new(settings(""), job);

    let first = pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap();
    assert_eq!(first.plan_source, Some(PlanSource::Computed));
    assert!(first.blocks > 1);

    let cache = out.path().join("tmp/root01024/hexahsToReconstruct.bin");
    let plan = ReconstructionPlan::load(&cache).unwrap();
    assert_eq!(plan.blocks.len(), first.blocks);
    assert!(plan.blocks.iter().all(|b| b.estimate <= 100));
    for block in &plan.blocks {
        assert!(out
            .path()
            .join("tmp/root01024/blocks")
            .join(&block.name)
            .is_dir());
    }
    let first_mesh = fs::read(out.path().join("denseReconstruction.bin")).unwrap();

    let second = pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap();
    assert_eq!(second.plan_source, Some(PlanSource::Cache));
    assert_eq!(ReconstructionPlan::load(&cache).unwrap(), plan);
    assert_eq!(second.blocks, first.blocks);
    assert_eq!(second.vertices, first.vertices);
    assert_eq!(
        fs::read(out.path().join("denseReconstruction.bin")).unwrap(),
        first_mesh
    );
}

struct EmptyEngine;

impl ReconstructionEngine for EmptyEngine {
    fn reconstruct(&mut self, _request: &BlockRequest<'_>) -> Result<LocalMeshResult> {
        Ok(LocalMeshResult::default())
    }
}

#[test]
fn test_empty_engine_output_aborts_without_artifacts() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let pipeline = MeshingPipeline::new(
        settings(""),
        job(out.path(), PartitioningMode::SingleBlock),
    );
    let err = pipeline.run(&provider, &mut EmptyEngine).unwrap_err();

    assert!(matches!(err, Error::EmptyMesh(ref m) if m.contains("block_0000")));
    assert!(!out.path().join("denseReconstruction.bin").exists());
    assert!(!out.path().join("meshPtsCamsFromDGC.bin").exists());
    assert!(!out.path().join("mesh.obj").exists());
}

#[test]
fn test_empty_engine_output_aborts_auto_run() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write_dataset(data.path());

    let provider = DepthMapFolders::new(data.path(), data.path());
    let pipeline = MeshingPipeline::new(settings(""), job(out.path(), PartitioningMode::Auto));
    let err = pipeline.run(&provider, &mut EmptyEngine).unwrap_err();

    assert!(matches!(err, Error::EmptyMesh(ref m) if m.contains("block_0000")));
    assert!(!out.path().join("denseReconstruction.bin").exists());
    assert!(!out.path().join("meshPtsCamsFromDGC.bin").exists());
    assert!(!out.path().join("mesh.obj").exists());
}

/// Two 6x6 sheets of samples on `z = 0`, at `x in [0, 1]` and `x in [9, 10]`,
/// spaced one track cell apart at resolution 51.
struct TwoPatches;

impl DatasetProvider for TwoPatches {
    fn load(&self) -> Result<Dataset> {
        let camera = Camera::new(
            0,
            CameraIntrinsics::new(20.0, 20.0, 8.0, 8.0, 16, 16),
            CameraExtrinsics::default(),
        );
        let mut samples = Vec::new();
        for x0 in [0.0, 9.0] {
            for i in 0..6 {
                for j in 0..6 {
                    samples.push(DepthSample {
                        position: Point3::new(x0 + 0.2 * i as f64, 0.2 * j as f64, 0.0),
                        camera: 0,
                        sim: -1.0,
                    });
                }
            }
        }
        Ok(Dataset::from_parts(vec![camera], samples))
    }
}

#[test]
fn test_auto_run_skips_empty_space_between_surfaces() {
    let out = tempdir().unwrap();
    let settings = "[largeScale]\ngridLevel0 = 51\nminGridLevel = 2\n"
        .parse::<MeshingConfig>()
        .unwrap()
        .settings()
        .unwrap();
    let mut job = job(out.path(), PartitioningMode::Auto);
    job.max_pts = 18;
    job.max_pts_per_voxel = 20;
    let pipeline = MeshingPipeline::new(settings, job);

    let summary = pipeline.run(&TwoPatches, &mut LatticeSurfaceEngine).unwrap();

    let cache = out.path().join("tmp/root01024/hexahsToReconstruct.bin");
    let plan = ReconstructionPlan::load(&cache).unwrap();
    assert_eq!(plan.grid.dims, [16, 2, 1]);
    let estimates: Vec<u64> = plan.blocks.iter().map(|b| b.estimate).collect();
    assert_eq!(estimates, vec![18, 18, 0, 0, 0, 0, 18, 18]);
    assert!(plan.blocks[2..6].iter().all(|b| b.cameras.is_empty()));

    assert_eq!(summary.blocks, 8);
    assert_eq!(summary.vertices, 84);
    assert_eq!(summary.faces, 100);

    let blocks = out.path().join("tmp/root01024/blocks");
    assert!(blocks.join("block_0000").is_dir());
    assert!(blocks.join("block_0007").is_dir());
    assert!(!blocks.join("block_0002").exists());

    let mesh = cv_io::load_obj(&out.path().join("mesh.obj")).unwrap();
    assert!(mesh.vertices.iter().all(|v| v.x < 1.5 || v.x > 8.5));
}

#[test]
fn test_missing_dataset_is_an_error() {
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();

    let provider = DepthMapFolders::new(data.path(), data.path());
    let pipeline = MeshingPipeline::new(
        settings(""),
        job(out.path(), PartitioningMode::Auto),
    );
    let err = pipeline.run(&provider, &mut LatticeSurfaceEngine).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
