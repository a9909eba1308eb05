use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn, LevelFilter};
use std::{
    io,
    path::{Path, PathBuf},
    time::Instant,
};

use tilepyr::{
    generate, plan, Artifacts, DirectorySink, ImageRaster, LayerType, MbtilesSink, Metadata, PyramidConfig,
    RasterSource, Report, Resampling, TileFormat, TileSink,
};

mod progress;

use progress::DotProgress;

/// Where the tiles go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    /// `.mbtiles` extension selects the container, anything else a directory.
    Auto,
    /// `<output>/<zoom>/<column>/<row>.<ext>` plus viewer pages.
    Directory,
    /// Single SQLite file; must not exist yet.
    Mbtiles,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for TileFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Png => TileFormat::Png,
            FormatArg::Jpeg => TileFormat::Jpeg,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResamplingArg {
    Nearest,
    Bilinear,
    Cubic,
    Lanczos,
}

impl From<ResamplingArg> for Resampling {
    fn from(r: ResamplingArg) -> Self {
        match r {
            ResamplingArg::Nearest => Resampling::Nearest,
            ResamplingArg::Bilinear => Resampling::Bilinear,
            ResamplingArg::Cubic => Resampling::Cubic,
            ResamplingArg::Lanczos => Resampling::Lanczos,
        }
    }
}

/// Cut a georeferenced raster into a tile pyramid.
#[derive(Parser, Debug, Clone)]
#[command(name = "raster2tiles", version, about)]
struct Args {
    /// Source raster (PNG, JPEG or (Geo)TIFF).
    input: PathBuf,

    /// Output directory or .mbtiles file.
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputKind::Auto)]
    output_kind: OutputKind,

    /// Layer name; defaults to the input file name.
    #[arg(short, long)]
    name: Option<String>,

    /// Title shown in viewer pages; defaults to the name.
    #[arg(long)]
    title: Option<String>,

    #[arg(short, long, default_value = "")]
    description: String,

    #[arg(short = 'r', long, default_value = "1.0")]
    layer_version: String,

    /// Mark the layer as an overlay instead of a base layer.
    #[arg(short, long, default_value_t = false)]
    overlay: bool,

    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// No progress bar, warnings and errors only.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    #[arg(long, default_value_t = tilepyr::config::DEFAULT_TILE_SIZE)]
    tile_size: u32,

    #[arg(long, value_enum, default_value_t = FormatArg::Png)]
    format: FormatArg,

    #[arg(long, default_value_t = tilepyr::config::DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    #[arg(long, value_enum, default_value_t = ResamplingArg::Nearest)]
    resampling: ResamplingArg,

    /// URL prefix for tile links in tilemapresource.xml and doc.kml.
    #[arg(long, default_value = "")]
    publish_url: String,

    #[arg(long)]
    googlemaps_key: Option<String>,

    #[arg(long, default_value_t = false)]
    no_kml: bool,

    #[arg(long, default_value_t = false)]
    no_tilemapresource: bool,

    #[arg(long, default_value_t = false)]
    no_openlayers: bool,

    #[arg(long, default_value_t = false)]
    no_googlemaps: bool,
}

impl Args {
    fn config(&self) -> PyramidConfig {
        let name = self.name.clone().unwrap_or_else(|| {
            self.input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let metadata = Metadata {
            title: self.title.clone().unwrap_or_else(|| name.clone()),
            name,
            description: self.description.clone(),
            version: self.layer_version.clone(),
            layer_type: if self.overlay {
                LayerType::Overlay
            } else {
                LayerType::BaseLayer
            },
        };

        let mut config = PyramidConfig::new(metadata);
        config.tile_size = self.tile_size;
        config.format = self.format.into();
        config.jpeg_quality = self.jpeg_quality;
        config.resampling = self.resampling.into();
        config.publish_url = self.publish_url.clone();
        if let Some(key) = &self.googlemaps_key {
            config.googlemaps_key = key.clone();
        }
        config.artifacts = Artifacts {
            tilemapresource: !self.no_tilemapresource,
            openlayers: !self.no_openlayers,
            googlemaps: !self.no_googlemaps,
            kml: !self.no_kml,
        };

        config
    }

    fn resolved_output_kind(&self) -> OutputKind {
        match self.output_kind {
            OutputKind::Auto if is_mbtiles_path(&self.output) => OutputKind::Mbtiles,
            OutputKind::Auto => OutputKind::Directory,
            kind => kind,
        }
    }
}

fn is_mbtiles_path(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("mbtiles"))
}

fn open_sink(kind: OutputKind, output: &Path, format: TileFormat) -> Result<Box<dyn TileSink>> {
    let sink: Box<dyn TileSink> = match kind {
        OutputKind::Mbtiles => {
            info!("Writing MBTiles container {}", output.display());
            Box::new(MbtilesSink::create(output).with_context(|| format!("creating {}", output.display()))?)
        }
        OutputKind::Directory => {
            info!("Writing tile directory {}", output.display());
            Box::new(
                DirectorySink::create(output, format.extension())
                    .with_context(|| format!("creating directory {}", output.display()))?,
            )
        }
        OutputKind::Auto => bail!("output kind must be resolved before opening the sink"),
    };

    Ok(sink)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    run(&args)?;
    Ok(())
}

fn run(args: &Args) -> Result<Report> {
    let config = args.config();
    debug!("{config:?}");

    let source = ImageRaster::open(&args.input).with_context(|| format!("opening {}", args.input.display()))?;
    if source.geometry().is_epsg4326() {
        debug!("Projection detected as EPSG:4326");
    }

    // Reject bad settings before an MBTiles file is created.
    plan(&source, &config).context("checking tile settings")?;

    let kind = args.resolved_output_kind();
    let mut sink = open_sink(kind, &args.output, config.format)?;

    let start = Instant::now();
    let mut bar = (!args.quiet).then(|| DotProgress::new(io::stdout()));

    let report = generate(&source, &mut sink, &config, |progress| {
        if let Some(bar) = bar.as_mut() {
            if let Err(err) = bar.update(progress) {
                warn!("progress output failed: {err}");
            }
        }
    })
    .with_context(|| format!("generating tiles into {}", args.output.display()))?;

    if let Some(bar) = bar.take() {
        bar.finish()?;
    }

    info!(
        "Done: {} tiles, {} documents, zoom 0..={} in {:.1?}",
        report.tiles_written,
        report.documents_written,
        report.params.max_zoom,
        start.elapsed()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("raster2tiles").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_follow_the_input_name() {
        let args = parse(&["maps/scan.tif", "out"]);
        let config = args.config();

        assert_eq!(config.metadata.name, "scan.tif");
        assert_eq!(config.metadata.title, "scan.tif");
        assert_eq!(config.metadata.version, "1.0");
        assert_eq!(config.metadata.layer_type, LayerType::BaseLayer);
        assert_eq!(config.format, TileFormat::Png);
        assert_eq!(config.tile_size, 256);
        assert!(config.artifacts.kml);
        assert_eq!(args.resolved_output_kind(), OutputKind::Directory);
    }

    #[test]
    fn mbtiles_extension_selects_container() {
        let args = parse(&["scan.tif", "out/Scan.MBTiles"]);
        assert_eq!(args.resolved_output_kind(), OutputKind::Mbtiles);

        let forced = parse(&["scan.tif", "out.mbtiles", "--output-kind", "directory"]);
        assert_eq!(forced.resolved_output_kind(), OutputKind::Directory);
    }

    #[test]
    fn flags_map_onto_config() {
        let args = parse(&[
            "scan.tif",
            "out",
            "-n",
            "prague",
            "--title",
            "Prague 1850",
            "-d",
            "cadastral map",
            "-r",
            "2.1",
            "-o",
            "--format",
            "jpeg",
            "--jpeg-quality",
            "90",
            "--resampling",
            "lanczos",
            "--no-kml",
            "--no-googlemaps",
        ]);
        let config = args.config();

        assert_eq!(config.metadata.name, "prague");
        assert_eq!(config.metadata.title, "Prague 1850");
        assert_eq!(config.metadata.description, "cadastral map");
        assert_eq!(config.metadata.version, "2.1");
        assert_eq!(config.metadata.layer_type, LayerType::Overlay);
        assert_eq!(config.format, TileFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.resampling, Resampling::Lanczos);
        assert!(!config.artifacts.kml);
        assert!(!config.artifacts.googlemaps);
        assert!(config.artifacts.openlayers);
    }

    #[test]
    fn bad_tile_size_leaves_no_mbtiles_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.png");
        image::RgbImage::new(40, 30).save(&input).unwrap();
        let output = dir.path().join("scan.mbtiles");

        let (input, output) = (input.to_str().unwrap(), output.to_str().unwrap());

        assert!(run(&parse(&[input, output, "-q", "--tile-size", "0"])).is_err());
        assert!(!Path::new(output).exists());

        let report = run(&parse(&[input, output, "-q", "--tile-size", "32"])).unwrap();
        assert_eq!(report.params.max_zoom, 1);
        assert!(Path::new(output).is_file());
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let argv = ["raster2tiles", "a.tif", "out", "--jpeg-quality", "0"];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
