// Fri Oct 16 2026 - Alex

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use x64_locator::{
    config::ScanConfig,
    dasm::{DecodedInstruction, X86Decoder},
    elf::ElfImage,
    memory::{Address, CodeBuffer, Protection},
    search::{HitKind, ImageScanner, InstructionScanner, PrologueMode, ScanHit},
    utils::{init_logger, level_from_verbosity, parse_address, parse_int, ScopedTimer},
};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Locate calls, LEAs and function starts in x86-64 ELF images", long_about = None)]
struct Args {
    #[arg(short, long)]
    binary: PathBuf,

    /// Address the image is mapped at; defaults to its link address
    #[arg(long, value_parser = parse_address)]
    base: Option<u64>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    json: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loadable segments
    Segments,
    /// Decode instructions starting at an address
    Dasm {
        #[arg(value_parser = parse_address)]
        at: u64,
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Find calls; any call unless --target is given
    FindCall {
        #[arg(long, value_parser = parse_address)]
        target: Option<u64>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Find `lea reg, [base + disp]`
    FindLea {
        #[arg(long, value_parser = parse_int, allow_hyphen_values = true)]
        disp: i64,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Find function starts
    Prologue {
        #[arg(long, default_value = "endbr64")]
        mode: PrologueMode,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Check whether a range is covered by a loaded segment
    Segment {
        #[arg(value_parser = parse_address)]
        vaddr: u64,
        #[arg(value_parser = parse_address)]
        size: u64,
        #[arg(long, default_value = "r")]
        flags: Protection,
    },
}

/// Without `--from` the whole image is swept, skipping bytes that do not
/// decode; a `--from` window stops at the first one.
#[derive(clap::Args, Debug)]
struct RangeArgs {
    #[arg(long, value_parser = parse_address)]
    from: Option<u64>,
    #[arg(long, value_parser = parse_address)]
    to: Option<u64>,
}

#[derive(Serialize)]
struct ListingLine {
    address: Address,
    length: usize,
    bytes: String,
    mnemonic: &'static str,
    class: String,
}

fn main() {
    let args = Args::parse();
    init_logger(level_from_verbosity(args.verbose));

    if let Err(e) = run(&args) {
        eprintln!("{} {:#}", "[!]".red(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => ScanConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ScanConfig::default(),
    };

    let file = File::open(&args.binary).with_context(|| format!("opening {}", args.binary.display()))?;
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {}", args.binary.display()))?;
    let data: &[u8] = &mmap;

    let image = match args.base {
        Some(base) => ElfImage::parse(data, Address::new(base))?,
        None => ElfImage::parse_at_link_address(data)?,
    };
    if !args.json {
        println!("{} Loaded {} (mapped at {})", "[*]".blue(), args.binary.display(), image.base());
    }

    let scanner = InstructionScanner::new().with_options(config.scan_options());

    match &args.command {
        Command::Segments => {
            let segments = image.segments();
            if args.json {
                let rows: Vec<_> = segments
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "index": s.index(),
                            "start": s.start(),
                            "end": s.end(),
                            "protection": s.protection().to_string(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for segment in &segments {
                    println!("  {}", segment);
                }
            }
        }
        Command::Dasm { at, count } => {
            let at = Address::new(*at);
            let code = image_scanner(&image, data, &config)?
                .code_at(at)
                .ok_or_else(|| anyhow!("{} is not inside an executable segment", at))?;
            let lines = listing(&code, at, count.unwrap_or(config.max_listing));
            if args.json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                for line in &lines {
                    println!("  {} {:<30} {}", line.address, line.bytes.dimmed(), line.mnemonic.cyan());
                }
            }
        }
        Command::FindCall { target, range } => {
            let target = target.map(Address::new);
            let images = image_scanner(&image, data, &config)?;
            let hits = match range_code(&images, range)? {
                Some(code) => {
                    let mut ctx = DecodedInstruction::new();
                    if scanner.find_call_instruction(&code, target, &mut ctx) {
                        vec![single_hit(HitKind::Call, &ctx, &image)]
                    } else {
                        Vec::new()
                    }
                }
                None => {
                    let _timer = ScopedTimer::new("find-call");
                    images.find_calls(target)
                }
            };
            report(&hits, args.json)?;
        }
        Command::FindLea { disp, range } => {
            let images = image_scanner(&image, data, &config)?;
            let hits = match range_code(&images, range)? {
                Some(code) => scanner
                    .find_lea(&code, *disp)
                    .map(|insn| vec![single_hit(HitKind::Lea, &insn, &image)])
                    .unwrap_or_default(),
                None => {
                    let _timer = ScopedTimer::new("find-lea");
                    images.find_leas(*disp)
                }
            };
            report(&hits, args.json)?;
        }
        Command::Prologue { mode, range } => {
            let images = image_scanner(&image, data, &config)?;
            let hits = match range_code(&images, range)? {
                Some(code) => scanner
                    .find_function_prologue(&code, *mode)
                    .map(|addr| {
                        let insn = DecodedInstruction { start: addr, ..Default::default() };
                        vec![single_hit(HitKind::Prologue, &insn, &image)]
                    })
                    .unwrap_or_default(),
                None => {
                    let _timer = ScopedTimer::new("prologue");
                    images.find_prologues(*mode)
                }
            };
            report(&hits, args.json)?;
        }
        Command::Segment { vaddr, size, flags } => {
            let found = image.find_segment(Address::new(*vaddr), *size, *flags, config.segment_step, config.flag_match);
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "contained": found.is_some(), "segment": found.as_ref().map(|s| s.index()) })
                );
            } else if let Some(segment) = found {
                println!("{} Contained in {}", "[+]".green(), segment);
            } else {
                println!("{} No {} segment covers 0x{:x}+0x{:x}", "[-]".yellow(), flags, vaddr, size);
            }
        }
    }

    Ok(())
}

/// Segment bytes are only touched by the commands that decode.
fn image_scanner<'a>(image: &ElfImage, data: &'a [u8], config: &ScanConfig) -> anyhow::Result<ImageScanner<'a>> {
    let sweep = InstructionScanner::new().with_options(config.sweep_options());
    Ok(ImageScanner::new(image, data)?.with_scanner(sweep))
}

fn range_code<'a>(images: &ImageScanner<'a>, range: &RangeArgs) -> anyhow::Result<Option<CodeBuffer<'a>>> {
    let Some(from) = range.from.map(Address::new) else {
        return Ok(None);
    };
    let code = images
        .code_at(from)
        .ok_or_else(|| anyhow!("{} is not inside an executable segment", from))?;
    let to = range.to.map(Address::new).unwrap_or(code.end());
    Ok(Some(code.subrange(from, to)?))
}

fn single_hit(kind: HitKind, insn: &DecodedInstruction, image: &ElfImage) -> ScanHit {
    let segment = image
        .segments()
        .into_iter()
        .find(|s| s.contains(insn.start))
        .map(|s| s.index())
        .unwrap_or_default();
    ScanHit {
        kind,
        address: insn.start,
        length: insn.length,
        segment,
        target: insn.call_target(),
    }
}

fn listing(code: &CodeBuffer<'_>, at: Address, count: usize) -> Vec<ListingLine> {
    let decoder = X86Decoder::new();
    let mut lines = Vec::new();
    let mut insn = DecodedInstruction::new();
    let mut cursor = at;

    while lines.len() < count && cursor < code.end() {
        match decoder.decode_into(&mut insn, code, cursor) {
            Ok(()) => {
                let bytes = insn
                    .bytes(code)
                    .unwrap_or_default()
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(ListingLine {
                    address: insn.start,
                    length: insn.length,
                    bytes,
                    mnemonic: insn.mnemonic(),
                    class: insn.class().to_string(),
                });
                cursor = insn.end();
            }
            Err(e) => {
                log::warn!("stopping listing: {}", e);
                break;
            }
        }
    }
    lines
}

fn report(hits: &[ScanHit], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("{} No matches", "[-]".yellow());
        return Ok(());
    }
    for hit in hits {
        println!("  {}", hit);
    }
    println!("{} {} match(es)", "[+]".green(), hits.len().to_string().green());
    Ok(())
}
