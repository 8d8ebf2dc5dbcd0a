use std::fs;
use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context};

use alice3d::{qnt, AarArchive, Pol};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "list" if args.len() == 3 => list(&args[2]),
        "extract" if args.len() == 5 => extract(&args[2], &args[3], &args[4]),
        "qnt2png" if args.len() == 4 => qnt2png(&args[2], &args[3]),
        "info" if args.len() == 3 => info(&args[2]),
        _ => {
            usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn usage() {
    eprintln!("Usage: export_cli <command> ...");
    eprintln!("  list <archive.aar>                    list archive entries");
    eprintln!("  extract <archive.aar> <entry> <out>   extract one entry");
    eprintln!("  qnt2png <file.qnt> <out.png>          decode an image");
    eprintln!("  info <file.pol|file.mot>              dump parsed structure as JSON");
}

fn open_archive(path: &str) -> anyhow::Result<AarArchive<File>> {
    let file = File::open(path).with_context(|| format!("opening {path}"))?;
    AarArchive::new(file).with_context(|| format!("parsing archive {path}"))
}

fn list(path: &str) -> anyhow::Result<()> {
    let archive = open_archive(path)?;
    for name in archive.filenames() {
        println!("{name}");
    }
    eprintln!("{} entries", archive.len());
    Ok(())
}

fn extract(path: &str, entry: &str, out: &str) -> anyhow::Result<()> {
    let mut archive = open_archive(path)?;
    let data = archive
        .load(entry)
        .with_context(|| format!("loading {entry}"))?;
    fs::write(out, &data).with_context(|| format!("writing {out}"))?;
    eprintln!("{} bytes -> {}", data.len(), out);
    Ok(())
}

fn qnt2png(path: &str, out: &str) -> anyhow::Result<()> {
    let data = fs::read(path).with_context(|| format!("reading {path}"))?;
    let decoded = qnt::decode(&data).with_context(|| format!("decoding {path}"))?;
    let image =
        image::RgbaImage::from_raw(decoded.width, decoded.height, decoded.pixels)
            .context("building image buffer")?;
    image.save(out).with_context(|| format!("writing {out}"))?;
    eprintln!(
        "{}x{} ({}) -> {}",
        decoded.width,
        decoded.height,
        if decoded.has_alpha { "rgba" } else { "rgb" },
        out
    );
    Ok(())
}

fn info(path: &str) -> anyhow::Result<()> {
    let data = fs::read(path).with_context(|| format!("reading {path}"))?;
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let json = match extension.as_str() {
        "pol" => serde_json::to_string_pretty(&Pol::parse(&data)?)?,
        "mot" => serde_json::to_string_pretty(&alice3d::Mot::parse(&data)?)?,
        other => bail!("cannot dump .{other} files"),
    };
    println!("{json}");
    Ok(())
}
