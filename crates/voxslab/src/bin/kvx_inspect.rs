//! # KVX Inspector
//!
//! Command-line tool that decodes a KVX (or VOX) model and reports what the
//! engine would see: mip extents, pivots, slab counts and mesh size.
//! With `--vox2gltf` it also writes the mesh out as a glTF model.

use std::path::Path;
use std::process::ExitCode;

use voxslab::voxslab_core::palette::RgbPalette;
use voxslab::{
    build_mesh_with, gltf_path, load_volume, summarize, ExportError, MeshConfig, VoxelConfig, VoxelModel, VoxelVolume,
};

struct Options {
    path: String,
    mip: Option<usize>,
    prune: bool,
    config: Option<String>,
    gltf_folder: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let path = args.get(1).filter(|a| !a.starts_with("--")).ok_or("missing input file")?.clone();
    let value_of = |flag: &str| args.iter().position(|a| a == flag).map(|i| args.get(i + 1));

    let mip = match value_of("--mip") {
        None => None,
        Some(value) => Some(
            value
                .and_then(|s| s.parse().ok())
                .ok_or("--mip expects a mip index")?,
        ),
    };
    let config = match value_of("--config") {
        None => None,
        Some(value) => Some(value.ok_or("--config expects a path")?.clone()),
    };
    let gltf_folder = match value_of("--vox2gltf") {
        None => None,
        Some(value) => Some(value.ok_or("--vox2gltf expects an output folder")?.clone()),
    };

    Ok(Options {
        path,
        mip,
        prune: !args.iter().any(|a| a == "--no-prune"),
        config,
        gltf_folder,
    })
}

fn print_usage() {
    println!("Usage: kvx_inspect <model.kvx|model.vox> [options]");
    println!();
    println!("Options:");
    println!("  --mip <n>            Mesh only mip level n (default: all)");
    println!("  --no-prune           Keep hidden voxels when converting VOX");
    println!("  --config <file>      Load decoder settings from a TOML file");
    println!("  --vox2gltf <folder>  Export the mesh (mip 0 or --mip) as <folder>/<name>.gltf");
}

fn run(options: &Options) -> Result<(), String> {
    let mut config = match &options.config {
        Some(path) => VoxelConfig::load(path).map_err(|e| format!("could not load config {path}: {e}"))?,
        None => VoxelConfig::default(),
    };
    config.exchange.prune_hidden &= options.prune;

    let bytes = std::fs::read(&options.path).map_err(|e| format!("could not read {}: {e}", options.path))?;
    let volume = load_volume(&options.path, &bytes, &config)
        .map_err(|e| format!("{} is not a valid voxel file: {e}", options.path))?;

    println!("Model:      {}", options.path);
    println!("File size:  {} bytes", bytes.len());
    println!("Palette:    {}", if volume.palette().is_some() { "embedded" } else { "none" });
    println!("Mip levels: {}", volume.mip_count());
    println!();

    println!("┌─ MIP LEVELS ───────────────────────────────────────────────────┐");
    for mip in summarize(&volume) {
        println!(
            "│ mip {}: {:>3} x {:>3} x {:>3}  pivot ({:.2}, {:.2}, {:.2})  {} slabs, {} voxels",
            mip.index,
            mip.size[0],
            mip.size[1],
            mip.size[2],
            mip.pivot[0],
            mip.pivot[1],
            mip.pivot[2],
            mip.slabs,
            mip.voxels
        );
    }
    println!("└────────────────────────────────────────────────────────────────┘");
    println!();

    let levels: Vec<usize> = match options.mip {
        Some(index) if index >= volume.mip_count() => {
            return Err(format!("mip {index} out of range (model has {})", volume.mip_count()));
        }
        Some(index) => vec![index],
        None => (0..volume.mip_count()).collect(),
    };

    println!("┌─ MESH ─────────────────────────────────────────────────────────┐");
    let mesh_config = MeshConfig::default();
    for index in levels {
        let mesh = build_mesh_with(&volume, index, &mesh_config);
        println!(
            "│ mip {index}: {} vertices, {} triangles ({} quads)",
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.quad_count()
        );
        if let Some((min, max)) = mesh.bounds() {
            println!(
                "│        bounds ({:.1}, {:.1}, {:.1}) .. ({:.1}, {:.1}, {:.1})",
                min[0], min[1], min[2], max[0], max[1], max[2]
            );
        }
    }
    println!("└────────────────────────────────────────────────────────────────┘");

    if let Some(folder) = &options.gltf_folder {
        export(&options.path, volume, folder, options.mip.unwrap_or(0))?;
    }
    Ok(())
}

/// Writes one mip as `<folder>/<file stem>.gltf`; an existing export is kept.
fn export(path: &str, volume: VoxelVolume, folder: &str, mip: usize) -> Result<(), String> {
    let name = Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| format!("cannot derive a model name from {path}"))?;
    let target = gltf_path(folder, name);
    if target.exists() {
        println!("Skipped:    {} already exists", target.display());
        return Ok(());
    }

    let model = VoxelModel::new(volume, &RgbPalette::grayscale());
    match model.write_gltf(folder, name, mip, &MeshConfig::default()) {
        Ok(written) => println!("Exported:   {}", written.display()),
        Err(ExportError::EmptyMesh) => println!("Skipped:    mip {mip} has no geometry"),
        Err(e) => return Err(format!("could not export {}: {e}", target.display())),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.iter().any(|a| a == "--help") {
        print_usage();
        return ExitCode::FAILURE;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
