use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dicom_pixeldata::PixelDecoder;
use tracing::{error, info, warn};

use vlphoto::config::Config;
use vlphoto::models::Metadata;
use vlphoto::pixel::ImageCrateDecoder;
use vlphoto::transmission::{
    Destination, DimseSessionTransport, DispatchOutcome, Dispatcher, SerializedRecord,
};
use vlphoto::worklist::OrderRecord;
use vlphoto::{init_logging, Engine, EngineSettings, ImageInput};

#[derive(Parser, Debug)]
#[command(name = "vlphoto", version, about = "Clinical photographs to DICOM")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "vlphoto.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode images and optionally send them
    Convert {
        /// Source images (JPEG, JPEG 2000, PNG, ...)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// View keyword, e.g. EV01; same as `-m image_type=EV01`
        #[arg(long)]
        view: Option<String>,

        /// JSON object of metadata keys shared by every image
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Extra metadata as key=value, overriding the JSON file
        #[arg(short = 'm', long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,

        /// Modality worklist item (Part 10 file) to inherit the order from
        #[arg(long)]
        worklist: Option<PathBuf>,

        /// Directory to write the encoded files into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Destination name from the config to send to
        #[arg(short, long)]
        send: Option<String>,
    },
    /// C-ECHO a DIMSE destination
    Echo { destination: String },
    /// Print a DICOM file as DICOM JSON
    Dump {
        file: PathBuf,

        /// Also render the first frame to this PNG file
        #[arg(long)]
        preview: Option<PathBuf>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn load_metadata(
    path: Option<&Path>,
    view: Option<String>,
    overrides: &[(String, String)],
) -> Result<Metadata> {
    let mut meta: Metadata = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading metadata {}", path.display()))?;
            serde_json::from_str::<HashMap<String, String>>(&text)
                .with_context(|| format!("parsing metadata {}", path.display()))?
        }
        None => HashMap::new(),
    };
    if let Some(view) = view {
        meta.insert("image_type".to_string(), view);
    }
    meta.extend(overrides.iter().cloned());
    Ok(meta)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    match cli.command {
        Command::Convert {
            images,
            view,
            metadata,
            meta,
            worklist,
            out,
            send,
        } => {
            convert(
                &config,
                &images,
                load_metadata(metadata.as_deref(), view, &meta)?,
                worklist.as_deref(),
                out.as_deref(),
                send.as_deref(),
            )
            .await
        }
        Command::Echo { destination } => echo(&config, &destination).await,
        Command::Dump { file, preview } => {
            let obj = part10::read_part10(&file)?;
            println!("{}", serde_json::to_string_pretty(&part10::to_json_value(&obj)?)?);
            if let Some(target) = preview {
                render_preview(&obj, &target)?;
            }
            Ok(())
        }
    }
}

async fn convert(
    config: &Config,
    images: &[PathBuf],
    metadata: Metadata,
    worklist: Option<&Path>,
    out: Option<&Path>,
    send: Option<&str>,
) -> Result<()> {
    if out.is_none() && send.is_none() {
        bail!("nothing to do: pass --out, --send or both");
    }
    let destination = send.map(|name| config.destination(name)).transpose()?;

    let codes = config.code_tables.load()?;
    let settings = EngineSettings::from_config(&config.engine)?;
    let engine = Engine::new(Arc::new(codes), Arc::new(ImageCrateDecoder), settings);

    let order = worklist.map(part10::read_part10).transpose()?;
    let order: Option<&dyn OrderRecord> = order.as_ref().map(|o| &**o as &dyn OrderRecord);

    let sources = images
        .iter()
        .map(|path| std::fs::read(path).with_context(|| format!("reading {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)?;
    }

    let mut records = Vec::new();
    let mut failed = 0usize;
    for (path, bytes) in images.iter().zip(&sources) {
        let mut input = ImageInput::new(bytes, &metadata);
        if let Some(order) = order {
            input = input.with_order(order);
        }
        let encoded = engine.build_record(&input).and_then(|record| {
            let uid = record.identity.sop_instance.to_string();
            engine.serialize(&record).map(|bytes| (uid, bytes))
        });
        let (uid, bytes) = match encoded {
            Ok(done) => done,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failed += 1;
                continue;
            }
        };

        if let Some(dir) = out {
            let target = dir.join(format!("{}.dcm", uid));
            std::fs::write(&target, &bytes)
                .with_context(|| format!("writing {}", target.display()))?;
            info!("{} -> {}", path.display(), target.display());
        }
        if destination.is_some() {
            records.push(SerializedRecord::from_part10(bytes)?);
        }
    }

    if let Some(destination) = destination {
        let dispatcher = Dispatcher::for_destination(destination, &config.dimse)?;
        match dispatcher.send(&records, destination).await {
            DispatchOutcome::PerRecord(results) => {
                for r in &results {
                    println!("{}\t{}", r.sop_instance_uid, r.result);
                }
            }
            DispatchOutcome::Aggregate(result) => println!("batch\t{}", result),
        }
    }

    if failed > 0 {
        warn!("{} of {} image(s) failed to encode", failed, images.len());
        bail!("{} image(s) failed", failed);
    }
    Ok(())
}

fn render_preview(
    obj: &dicom_object::FileDicomObject<dicom_object::InMemDicomObject>,
    target: &Path,
) -> Result<()> {
    let pixels = obj.decode_pixel_data().context("decoding pixel data")?;
    let image = pixels.to_dynamic_image(0).context("rendering frame 0")?;
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, dicom_pixeldata::image::ImageFormat::Png)
        .context("encoding preview")?;
    std::fs::write(target, out.into_inner())
        .with_context(|| format!("writing {}", target.display()))?;
    info!("Preview written to {}", target.display());
    Ok(())
}

async fn echo(config: &Config, name: &str) -> Result<()> {
    let node = match config.destination(name)? {
        Destination::Dimse(node) => node,
        other => bail!("{} is not a DIMSE destination", other.describe()),
    };
    let transport = DimseSessionTransport::new(config.dimse.clone());
    let status = transport.verify(node).await?;
    println!("C-ECHO {}: status 0x{:04X}", node.ae_title, status);
    Ok(())
}
