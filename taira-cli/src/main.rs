use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tabled::{Table, Tabled};
use taira_core::{ByteReader, Endianness, FLAT_VERSION, FlatHeader, FlatImage, detect_endianness};

/// Simple flat-image introspection CLI
#[derive(Parser)]
#[command(
    name = "taira",
    about = "Inspect uClinux flat binaries (header fields, entry point, and flags)",
    version,
    author
)]
struct Cli {
    /// Path to flat-image file
    #[arg(required = true)]
    path: std::path::PathBuf,

    /// Byte order of the header fields
    #[arg(long, value_enum, default_value = "auto")]
    endian: Endian,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Endian {
    /// Infer from the signature bytes
    Auto,
    Little,
    Big,
}

#[derive(Subcommand)]
enum Command {
    /// Show all header fields
    Header {
        /// Emit the header as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show entry point of the image
    Entry,
    /// Validate the header signature, revision, and flags
    Check,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("inspecting {}", cli.path.display());

    match cli.command {
        Command::Header { json } => {
            let img = open_image(&cli)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&img.header)?);
            } else {
                println!("{}", Table::new(header_rows(&img.header)));
            }
        }

        Command::Entry => {
            let img = open_image(&cli)?;
            println!("Entry point: {:#x}", img.entry_offset());
        }

        // The check subcommand parses the header without the image-level
        // magic rejection, so a malformed file still gets a verdict.
        Command::Check => {
            let buf = std::fs::read(&cli.path)?;
            let endianness = resolve_endianness(&buf, cli.endian)?;
            let mut rd = ByteReader::with_endianness(&buf, endianness);
            let header =
                FlatHeader::parse(&mut rd).map_err(|e| anyhow!("{}: {e}", cli.path.display()))?;
            check_header(&header, endianness);
        }
    }

    Ok(())
}

fn open_image(cli: &Cli) -> Result<FlatImage> {
    match cli.endian {
        Endian::Auto => FlatImage::open(&cli.path),
        Endian::Little => FlatImage::open_with_endianness(&cli.path, Endianness::Little),
        Endian::Big => FlatImage::open_with_endianness(&cli.path, Endianness::Big),
    }
}

fn resolve_endianness(buf: &[u8], choice: Endian) -> Result<Endianness> {
    Ok(match choice {
        Endian::Little => Endianness::Little,
        Endian::Big => Endianness::Big,
        Endian::Auto => detect_endianness(buf)
            .ok_or_else(|| anyhow!("no bFLT signature found; pass --endian explicitly"))?,
    })
}

fn header_rows(header: &FlatHeader) -> Vec<FieldRow> {
    let hex = |value: u32| format!("{value:#010x}");
    let row = |name: &str, value: String| FieldRow {
        name: name.to_string(),
        value,
    };

    let mut rows = vec![
        row("magic", hex(header.magic)),
        row("rev", header.rev.to_string()),
        row("entry", hex(header.entry)),
        row("data_start", hex(header.data_start)),
        row("data_end", hex(header.data_end)),
        row("bss_end", hex(header.bss_end)),
        row("stack_size", header.stack_size.to_string()),
        row("reloc_start", hex(header.reloc_start)),
        row("reloc_count", header.reloc_count.to_string()),
        row(
            "flags",
            format!("{:#010x} [{}]", header.flags, header.flag_names().join(", ")),
        ),
    ];
    for (i, word) in header.filler.iter().enumerate() {
        rows.push(row(&format!("filler[{i}]"), hex(*word)));
    }
    rows
}

fn check_header(header: &FlatHeader, endianness: Endianness) {
    let verdict = |ok: bool| if ok { "OK".green() } else { "BAD".red() };

    println!("byte order  {endianness:?}");
    println!(
        "magic       {:#010x}  {}",
        header.magic,
        verdict(header.has_valid_magic())
    );
    println!(
        "rev         {:<10}  {}",
        header.rev,
        verdict(header.rev == FLAT_VERSION)
    );
    println!(
        "segments    start={:#x} end={:#x} bss={:#x}  {}",
        header.data_start,
        header.data_end,
        header.bss_end,
        verdict(header.data_start <= header.data_end && header.data_end <= header.bss_end)
    );
    println!(
        "flags       {:#010x}  [{}]",
        header.flags,
        header.flag_names().join(", ")
    );
    if header.is_gzipped() {
        println!(
            "{}",
            "note: compressed image; payload inspection unsupported".yellow()
        );
    }
}
