use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mien_core::{
    ColorImage, PackingMode, PipelineConfig, PipelineContext, Rotation,
};
use mien_hw::Camera;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mien", about = "Mien live emotion recognition CLI")]
struct Cli {
    /// Directory containing the ONNX model files.
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Emit results as JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the emotion in a single image file
    Classify {
        /// Path to the image (any format the `image` crate decodes)
        image: PathBuf,
        /// Tensor packing mode; must match the shipped classifier
        #[arg(long, value_enum, default_value = "raw")]
        packing: PackingArg,
        /// Clockwise rotation to apply before classification (0/90/180/270)
        #[arg(long, default_value_t = 0)]
        rotation: u32,
    },
    /// Run live recognition against a camera
    Live {
        /// V4L2 device path
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Camera mount rotation in degrees (0/90/180/270)
        #[arg(long, default_value_t = 0)]
        rotation: u32,
        /// Stop after this many classified frames (0 = run until killed)
        #[arg(long, default_value_t = 0)]
        frames: u64,
    },
    /// List available camera devices
    Devices,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PackingArg {
    Raw,
    Normalized,
}

impl From<PackingArg> for PackingMode {
    fn from(arg: PackingArg) -> Self {
        match arg {
            PackingArg::Raw => PackingMode::Raw,
            PackingArg::Normalized => PackingMode::Normalized,
        }
    }
}

fn parse_rotation(degrees: u32) -> Result<Rotation> {
    Rotation::from_degrees(degrees)
        .with_context(|| format!("invalid rotation {degrees}, want 0/90/180/270"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model_dir = cli
        .model_dir
        .clone()
        .unwrap_or_else(mien_core::default_model_dir);

    match cli.command {
        Commands::Classify {
            image,
            packing,
            rotation,
        } => {
            let rotation = parse_rotation(rotation)?;
            let config = PipelineConfig {
                packing: packing.into(),
                ..PipelineConfig::default()
            };
            let mut ctx = PipelineContext::from_model_dir(config, &model_dir);

            let decoded = image::open(&image)
                .with_context(|| format!("opening image {}", image.display()))?
                .to_rgb8();
            let color = ColorImage::from_rgb_image(&decoded);

            let outcome = ctx.process_image(&color, rotation);
            let Some(result) = outcome.result() else {
                bail!("no result for {}: {outcome:?}", image.display());
            };
            print_result(&result, cli.json)?;
        }
        Commands::Live {
            device,
            rotation,
            frames,
        } => {
            let rotation = parse_rotation(rotation)?;
            let mut ctx =
                PipelineContext::from_model_dir(PipelineConfig::default(), &model_dir);

            let camera = Camera::open(&device, rotation)
                .with_context(|| format!("opening camera {device}"))?;
            tracing::info!(
                device,
                width = camera.width,
                height = camera.height,
                fourcc = ?camera.fourcc,
                "camera opened"
            );

            let mut stream = camera.stream()?;
            let mut classified = 0u64;
            loop {
                let frame = stream.next_frame()?;
                let outcome = ctx.process_frame(&frame);
                if let Some(result) = outcome.result() {
                    print_result(&result, cli.json)?;
                    classified += 1;
                    if frames > 0 && classified >= frames {
                        break;
                    }
                }
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            }
            for device in devices {
                println!("{}\t{} ({})", device.path, device.name, device.driver);
            }
        }
    }

    Ok(())
}

fn print_result(result: &mien_core::InferenceResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!("{result}");
    }
    Ok(())
}
