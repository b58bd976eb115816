//! Intcode VM - CLI Entry Point
//!
//! Commands:
//! - `intcode-vm run <image>` - Run an image with stdin/stdout as I/O
//! - `intcode-vm decode <word>...` - Decode instruction words
//! - `intcode-vm dump <image>` - Print the memory layout of an image
//!
//! An image is a JSON array of integers. Program output goes to stdout;
//! everything else goes to stderr.

use clap::{Parser, Subcommand};
use intcode::io::{ConsoleInput, ConsoleOutput};
use intcode::{Machine, Memory, Word};

/// Memory capacity used when `--memory` is not given.
const DEFAULT_MEMORY: usize = 4096;

#[derive(Parser)]
#[command(name = "intcode-vm")]
#[command(version)]
#[command(about = "An interpreter for the Intcode virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an image until it halts
    Run {
        /// Path to the JSON image to execute
        image: String,
        /// Memory capacity in words (raised to the image size if smaller)
        #[arg(short, long, default_value_t = DEFAULT_MEMORY)]
        memory: usize,
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Print each executed instruction to stderr
        #[arg(short, long)]
        trace: bool,
        /// Print the memory dump to stderr after the run
        #[arg(short, long)]
        dump: bool,
        /// Write a JSON snapshot of the machine after the run
        #[arg(short, long)]
        snapshot: Option<String>,
    },
    /// Decode instruction words
    Decode {
        /// Words to decode
        #[arg(required = true, allow_negative_numbers = true)]
        words: Vec<Word>,
    },
    /// Print the memory dump of an image without running it
    Dump {
        /// Path to the JSON image
        image: String,
        /// Memory capacity in words (raised to the image size if smaller)
        #[arg(short, long, default_value_t = 0)]
        memory: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { image, memory, max_cycles, trace, dump, snapshot } => {
            run_image(&image, memory, max_cycles, trace, dump, snapshot.as_deref());
        }
        Commands::Decode { words } => {
            decode_words(&words);
        }
        Commands::Dump { image, memory } => {
            dump_image(&image, memory);
        }
    }
}

fn load_image(path: &str) -> Vec<Word> {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str::<Vec<Word>>(&source) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Invalid image: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_image(
    path: &str,
    memory: usize,
    max_cycles: Option<u64>,
    trace: bool,
    dump: bool,
    snapshot: Option<&str>,
) {
    let image = load_image(path);
    if image.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    let capacity = memory.max(image.len());
    let mut machine = match Machine::new(
        path,
        capacity,
        &image,
        ConsoleInput::stdin(),
        ConsoleOutput::stdout(),
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    let limit = max_cycles.unwrap_or(u64::MAX);
    while machine.is_running() && machine.cycles() < limit {
        let pc = machine.pc();

        match machine.step() {
            Ok(instr) => {
                if trace {
                    eprintln!("{:04}: {:<10} rbo={}", pc, instr.to_string(), machine.rbo());
                }
            }
            Err(e) => {
                eprintln!("❌ Machine fault at PC={}: {}", pc, e);
                break;
            }
        }
    }

    if dump {
        eprintln!();
        eprint!("{}", machine.dump());
    }

    if let Some(out_path) = snapshot {
        let written = serde_json::to_string_pretty(&machine.snapshot())
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(out_path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("❌ Failed to write snapshot: {}", e);
            std::process::exit(1);
        }
    }

    if machine.is_running() {
        eprintln!("⚠️  Reached max cycles limit ({}) at PC={}", limit, machine.pc());
    }
    if machine.is_broken() {
        std::process::exit(1);
    }
}

fn decode_words(words: &[Word]) {
    for &word in words {
        match intcode::decode(word) {
            Ok(instr) => println!("{:>8}: {}", word, instr),
            Err(e) => println!("{:>8}: ??? ; {}", word, e),
        }
    }
}

fn dump_image(path: &str, memory: usize) {
    let image = load_image(path);

    match Memory::with_program(memory.max(image.len()), &image) {
        Ok(mem) => print!("{}", mem.dump(0)),
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    }
}
