//! Offline access to the CPU half of the globe: texture synthesis, point
//! preprocessing and sphere mesh sizing, without a GPU.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use globe_core::{
    mesh::build_sphere, GeoPoint, Preprocessor, TextureAsset, TextureKind, TextureSet, TextureSynthesizer,
};
use log::{info, warn};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Parser, Debug)]
#[command(name = "globe_tool", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize the four earth maps and write them as PNG.
    Textures {
        #[arg(long, default_value = "textures")]
        out_dir: PathBuf,

        /// Defaults to the clock.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Clamp outliers, cluster, correct for curvature and decimate a JSON array of points.
    Preprocess {
        input: PathBuf,

        /// Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report vertex and index counts for a UV sphere.
    Mesh {
        #[arg(long, default_value_t = 100)]
        stacks: u32,

        #[arg(long, default_value_t = 100)]
        slices: u32,

        #[arg(long, default_value_t = 1.0)]
        radius: f32,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Textures { out_dir, seed } => {
            let seed = seed.unwrap_or_else(globe_core::clock_seed);
            info!("Synthesizing textures with seed {seed}");
            let t0 = Instant::now();
            let set = TextureSet::from_synthesizer(&TextureSynthesizer::new(seed));
            write_textures(&set, &out_dir)?;
            info!("Done in {:.2?}", t0.elapsed());
        }
        Command::Preprocess { input, output } => {
            let points = read_points(&input)?;
            let (out, report) = Preprocessor::default().run(&points);
            info!("{report:?}");

            let json = serde_json::to_string_pretty(&out)?;
            match output {
                Some(path) => fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = BufWriter::new(std::io::stdout().lock());
                    writeln!(stdout, "{json}")?;
                }
            }
        }
        Command::Mesh { stacks, slices, radius } => {
            let mesh = build_sphere(radius, stacks, slices)?;
            println!(
                "{stacks}x{slices} sphere: {} vertices ({} bytes), {} indices ({} bytes), {} triangles",
                mesh.vertices.len(),
                mesh.vertex_bytes().len(),
                mesh.indices.len(),
                mesh.index_bytes().len(),
                mesh.triangle_count()
            );
        }
    }

    Ok(())
}

fn read_points(path: &Path) -> Result<Vec<GeoPoint>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let points: Vec<GeoPoint> =
        serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))?;
    info!("Read {} points from {}", points.len(), path.display());
    Ok(points)
}

fn file_name(kind: TextureKind) -> &'static str {
    match kind {
        TextureKind::Diffuse => "diffuse.png",
        TextureKind::Night => "night.png",
        TextureKind::Normal => "normal.png",
        TextureKind::Specular => "specular.png",
    }
}

fn write_png(asset: &TextureAsset, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(asset.width, asset.height, asset.data.clone())
        .context("texture data does not match its dimensions")?;
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn write_textures(set: &TextureSet, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    for kind in TextureKind::ALL {
        if set.substituted.contains(&kind) {
            warn!("{kind} map was substituted with a flat colour");
        }
        let path = out_dir.join(file_name(kind));
        write_png(set.get(kind), &path)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
