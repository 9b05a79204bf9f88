use std::{fs, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use vesture::{
    CancelToken, InferenceServices,
    codec::{decode_raster, encode_png},
    extract::extract,
    locate::locate,
    pipeline::try_on,
};

#[derive(Parser, Debug)]
#[command(name = "vesture", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a garment photo onto a user photo.
    Compose(ComposeArgs),
    /// Extract the garment sprite from a product photo.
    Extract(ExtractArgs),
    /// Print the located body region as JSON.
    Locate(LocateArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Garment product photo.
    #[arg(long)]
    garment: PathBuf,

    /// User photo.
    #[arg(long)]
    user: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also print the located body region as JSON.
    #[arg(long)]
    dump_region: bool,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Garment product photo.
    #[arg(long)]
    garment: PathBuf,

    /// Output PNG path for the sprite.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct LocateArgs {
    /// User photo.
    #[arg(long)]
    user: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => compose(args),
        Command::Extract(args) => extract_sprite(args),
        Command::Locate(args) => locate_region(args),
    }
}

fn read_raster(path: &PathBuf, what: &str) -> anyhow::Result<vesture::RasterImage> {
    let bytes = fs::read(path).with_context(|| format!("read {what} {}", path.display()))?;
    decode_raster(&bytes).with_context(|| format!("decode {what} {}", path.display()))
}

fn compose(args: ComposeArgs) -> anyhow::Result<()> {
    let product = read_raster(&args.garment, "garment photo")?;
    let user = read_raster(&args.user, "user photo")?;

    let services = InferenceServices::none();
    if args.dump_region {
        let region = locate(&user, &services);
        println!("{}", serde_json::to_string_pretty(&region)?);
    }

    let out = try_on(&product, &user, &services, &CancelToken::new())?;
    fs::write(&args.out, encode_png(&out)?)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn extract_sprite(args: ExtractArgs) -> anyhow::Result<()> {
    let product = read_raster(&args.garment, "garment photo")?;
    let sprite = extract(&product, None);
    if !sprite.extracted {
        eprintln!("no garment found, writing source unchanged");
    }
    fs::write(&args.out, encode_png(&sprite.raster)?)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn locate_region(args: LocateArgs) -> anyhow::Result<()> {
    let user = read_raster(&args.user, "user photo")?;
    let region = locate(&user, &InferenceServices::none());
    println!("{}", serde_json::to_string_pretty(&region)?);
    Ok(())
}
