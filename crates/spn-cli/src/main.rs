//! Command-line interface for the toy SPN cipher.

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use spn_analysis::{
    find_trails, recover_round_keys, AttackConfig, DifferenceDistributionTable, TrailCatalog,
};
use spn_core::{to_bits, Block, Cipher, CipherParams, PBox, SBox};

/// Tutorial S-box from the differential cryptanalysis walkthrough.
const DEFAULT_SBOX: &str = "e4d12fb83a6c5907";
/// Tutorial P-box: bit i of nibble j moves to bit j of nibble i.
const DEFAULT_PBOX: &str = "048c159d26ae37bf";

/// Toy SPN cipher CLI.
#[derive(Parser)]
#[command(
    name = "spn",
    version,
    author,
    about = "Toy SPN cipher CLI (encrypt, trace, differential analysis)"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a block.
    Encrypt {
        #[command(flatten)]
        cipher: CipherArgs,
        /// Plaintext block in hex (1 digit toy, 4 digits SPN; shorter
        /// input is left-padded with zeros).
        #[arg(long, value_name = "HEX")]
        block: String,
    },
    /// Decrypt a block.
    Decrypt {
        #[command(flatten)]
        cipher: CipherArgs,
        /// Ciphertext block in hex.
        #[arg(long, value_name = "HEX")]
        block: String,
    },
    /// Show every intermediate state of an encryption or decryption.
    Trace {
        #[command(flatten)]
        cipher: CipherArgs,
        /// Input block in hex.
        #[arg(long, value_name = "HEX")]
        block: String,
        /// Trace the decryption direction instead of encryption.
        #[arg(long)]
        decrypt: bool,
    },
    /// Print the difference distribution table of an S-box.
    Ddt {
        /// S-box as 16 hex digits.
        #[arg(long, value_name = "HEX", default_value = DEFAULT_SBOX)]
        sbox: String,
    },
    /// Search differential trails and optionally save the full catalog.
    Trails {
        /// S-box as 16 hex digits.
        #[arg(long, value_name = "HEX", default_value = DEFAULT_SBOX)]
        sbox: String,
        /// P-box as 16 hex digits.
        #[arg(long, value_name = "HEX", default_value = DEFAULT_PBOX)]
        pbox: String,
        /// Rounds to propagate each trail through.
        #[arg(long, default_value_t = 3)]
        rounds: usize,
        /// How many of the best trails to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Write the catalog for all partial-round depths to this file.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Recover the round keys of a keyed SPN oracle with chosen plaintexts.
    Attack {
        /// S-box as 16 hex digits (public cipher parameter).
        #[arg(long, value_name = "HEX", default_value = DEFAULT_SBOX)]
        sbox: String,
        /// P-box as 16 hex digits (public cipher parameter).
        #[arg(long, value_name = "HEX", default_value = DEFAULT_PBOX)]
        pbox: String,
        /// The oracle's secret round keys, five values of 4 hex digits.
        #[arg(long = "key", value_name = "HEX", required = true)]
        keys: Vec<String>,
        /// Optional RNG seed for reproducible plaintext choices.
        #[arg(long)]
        seed: Option<u64>,
        /// Load a precomputed trail catalog instead of searching.
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },
    /// Run a seeded demo: random keys, encrypt, trace, decrypt back.
    Demo {
        /// Optional RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Cipher parameters shared by the encrypt/decrypt/trace commands.
#[derive(Args)]
struct CipherArgs {
    /// Cipher variant.
    #[arg(long, value_enum, default_value = "spn")]
    variant: Variant,
    /// S-box as 16 hex digits.
    #[arg(long, value_name = "HEX", default_value = DEFAULT_SBOX)]
    sbox: String,
    /// P-box as 16 hex digits (SPN only; defaults to the tutorial table).
    #[arg(long, value_name = "HEX")]
    pbox: Option<String>,
    /// Round keys in hex, one `--key` per round key (2 toy, 5 SPN).
    #[arg(long = "key", value_name = "HEX", required = true)]
    keys: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Single-nibble block, two round keys, no permutation layer.
    Toy,
    /// Four-nibble block, four rounds, five round keys.
    Spn,
}

impl Variant {
    fn params(self) -> CipherParams {
        match self {
            Variant::Toy => CipherParams::toy(),
            Variant::Spn => CipherParams::spn(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Encrypt { cipher, block } => cmd_encrypt(&cipher, &block),
        Commands::Decrypt { cipher, block } => cmd_decrypt(&cipher, &block),
        Commands::Trace {
            cipher,
            block,
            decrypt,
        } => cmd_trace(&cipher, &block, decrypt),
        Commands::Ddt { sbox } => cmd_ddt(&sbox),
        Commands::Trails {
            sbox,
            pbox,
            rounds,
            top,
            out,
        } => cmd_trails(&sbox, &pbox, rounds, top, out.as_ref()),
        Commands::Attack {
            sbox,
            pbox,
            keys,
            seed,
            catalog,
        } => cmd_attack(&sbox, &pbox, &keys, seed, catalog.as_ref()),
        Commands::Demo { seed } => cmd_demo(seed),
    }
}

fn cmd_encrypt(args: &CipherArgs, block_hex: &str) -> Result<()> {
    let cipher = build_cipher(args)?;
    let block = parse_block(block_hex, cipher.params().width())?;
    let output = cipher.encrypt(&block).context("encrypt block")?;
    println!("ciphertext: 0x{}", format_block(&output));
    Ok(())
}

fn cmd_decrypt(args: &CipherArgs, block_hex: &str) -> Result<()> {
    let cipher = build_cipher(args)?;
    let block = parse_block(block_hex, cipher.params().width())?;
    let output = cipher.decrypt(&block).context("decrypt block")?;
    println!("plaintext: 0x{}", format_block(&output));
    Ok(())
}

fn cmd_trace(args: &CipherArgs, block_hex: &str, decrypt: bool) -> Result<()> {
    let cipher = build_cipher(args)?;
    let block = parse_block(block_hex, cipher.params().width())?;
    let trace = if decrypt {
        cipher.decrypt_traced(&block).context("trace decryption")?
    } else {
        cipher.encrypt_traced(&block).context("trace encryption")?
    };
    for (index, step) in trace.steps.iter().enumerate() {
        println!(
            "step {index:2}: 0x{:<4} {}",
            format_block(step),
            format_bits(step)
        );
    }
    println!("output: 0x{}", format_block(&trace.output));
    Ok(())
}

fn cmd_ddt(sbox_hex: &str) -> Result<()> {
    let sbox = parse_sbox(sbox_hex)?;
    print!("{}", DifferenceDistributionTable::new(&sbox));
    Ok(())
}

fn cmd_trails(
    sbox_hex: &str,
    pbox_hex: &str,
    rounds: usize,
    top: usize,
    out: Option<&PathBuf>,
) -> Result<()> {
    let sbox = parse_sbox(sbox_hex)?;
    let pbox = parse_pbox(pbox_hex, 16)?;
    let ddt = DifferenceDistributionTable::new(&sbox);
    let trails = find_trails(&ddt, &pbox, rounds);
    for trail in trails.iter().take(top) {
        println!(
            "0x{:04x} -> 0x{:04x}  probability {:.6}  preference {:.6}",
            trail.input_xor, trail.output_xor, trail.probability, trail.preference
        );
    }
    if let Some(path) = out {
        let catalog = TrailCatalog::build(&ddt, &pbox);
        let bytes = catalog.to_bytes().context("serialize trail catalog")?;
        fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
        println!("catalog written to {}", path.display());
    }
    Ok(())
}

fn cmd_attack(
    sbox_hex: &str,
    pbox_hex: &str,
    keys: &[String],
    seed: Option<u64>,
    catalog_path: Option<&PathBuf>,
) -> Result<()> {
    let sbox = parse_sbox(sbox_hex)?;
    let pbox = parse_pbox(pbox_hex, 16)?;
    if keys.len() != 5 {
        bail!("the SPN oracle takes exactly 5 round keys, got {}", keys.len());
    }
    let key_blocks = keys
        .iter()
        .map(|key| parse_block(key, 4))
        .collect::<Result<Vec<Block>>>()?;
    let oracle = Cipher::new(
        CipherParams::spn(),
        sbox.clone(),
        Some(pbox.clone()),
        key_blocks,
    )
    .context("assemble oracle")?;

    let catalog = match catalog_path {
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("read {}", path.display()))?;
            TrailCatalog::from_bytes(&bytes).context("deserialize trail catalog")?
        }
        None => {
            println!("searching differential trails...");
            TrailCatalog::build(&DifferenceDistributionTable::new(&sbox), &pbox)
        }
    };

    let mut rng = seeded_rng(seed);
    match recover_round_keys(&oracle, &catalog, &AttackConfig::default(), &mut rng)
        .context("run key recovery")?
    {
        Some(recovered) => {
            println!("recovered round keys (confirmed against the oracle):");
            for (index, key) in recovered.iter().enumerate() {
                println!("  key{}: 0x{key:04x}", index + 1);
            }
        }
        None => bail!("no candidate key set survived confirmation"),
    }
    Ok(())
}

fn cmd_demo(seed: Option<u64>) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let keys: Vec<Block> = (0..5)
        .map(|_| (0..4).map(|_| rng.gen_range(0..16u8)).collect())
        .collect();
    let formatted: Vec<String> = keys.iter().map(|key| format!("0x{}", format_block(key))).collect();
    println!("demo keys: {}", formatted.join(" "));

    let cipher = Cipher::new(
        CipherParams::spn(),
        parse_sbox(DEFAULT_SBOX)?,
        Some(parse_pbox(DEFAULT_PBOX, 16)?),
        keys,
    )
    .context("assemble demo cipher")?;

    let block: Block = (0..4).map(|_| rng.gen_range(0..16u8)).collect();
    println!("plaintext: 0x{}", format_block(&block));

    let trace = cipher.encrypt_traced(&block).context("trace encryption")?;
    for (index, step) in trace.steps.iter().enumerate() {
        println!("step {index:2}: 0x{} {}", format_block(step), format_bits(step));
    }
    println!("ciphertext: 0x{}", format_block(&trace.output));

    let decrypted = cipher.decrypt(&trace.output).context("decrypt block")?;
    println!("decrypted: 0x{}", format_block(&decrypted));
    if decrypted != block {
        bail!("demo roundtrip failed");
    }
    Ok(())
}

fn build_cipher(args: &CipherArgs) -> Result<Cipher> {
    let params = args.variant.params();
    if args.keys.len() != params.round_key_count() {
        bail!(
            "this variant takes exactly {} round keys, got {}",
            params.round_key_count(),
            args.keys.len()
        );
    }
    let sbox = parse_sbox(&args.sbox)?;
    let pbox = match (args.variant, &args.pbox) {
        (Variant::Toy, None) => None,
        (Variant::Toy, Some(_)) => bail!("the toy cipher has no permutation layer"),
        (Variant::Spn, maybe) => Some(parse_pbox(
            maybe.as_deref().unwrap_or(DEFAULT_PBOX),
            params.width() * 4,
        )?),
    };
    let keys = args
        .keys
        .iter()
        .map(|key| parse_block(key, params.width()))
        .collect::<Result<Vec<Block>>>()?;
    Cipher::new(params, sbox, pbox, keys).context("assemble cipher")
}

/// Parses a fixed-width hex block, left-padding shorter input with zeros.
fn parse_block(hex_str: &str, width: usize) -> Result<Block> {
    let digits = hex_str.trim().trim_start_matches("0x");
    if digits.chars().count() > width {
        bail!("'{hex_str}' has more than {width} hex digits");
    }
    let mut block = vec![0u8; width];
    let offset = width - digits.chars().count();
    for (slot, digit) in block[offset..].iter_mut().zip(digits.chars()) {
        let value = digit
            .to_digit(16)
            .with_context(|| format!("invalid hex digit '{digit}'"))?;
        *slot = value as u8;
    }
    Ok(block)
}

fn parse_sbox(hex_str: &str) -> Result<SBox> {
    let entries = parse_nibbles(hex_str).context("parse s-box")?;
    SBox::new(&entries).context("validate s-box")
}

fn parse_pbox(hex_str: &str, bits: usize) -> Result<PBox> {
    let entries: Vec<usize> = parse_nibbles(hex_str)
        .context("parse p-box")?
        .iter()
        .map(|&value| value as usize)
        .collect();
    PBox::new(&entries, bits).context("validate p-box")
}

/// Decodes an even-length hex string into one nibble per digit.
fn parse_nibbles(hex_str: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_str.trim()).context("decode hex")?;
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok(nibbles)
}

fn format_block(block: &[u8]) -> String {
    block.iter().map(|nibble| format!("{nibble:x}")).collect()
}

fn format_bits(block: &[u8]) -> String {
    to_bits(block)
        .chunks(4)
        .map(|chunk| chunk.iter().map(|bit| bit.to_string()).collect::<String>())
        .collect::<Vec<String>>()
        .join(" ")
}

fn seeded_rng(seed: Option<u64>) -> ChaCha20Rng {
    let mut seed_bytes = [0u8; 32];
    match seed {
        Some(value) => seed_bytes[..8].copy_from_slice(&value.to_le_bytes()),
        None => rand::rngs::OsRng.fill_bytes(&mut seed_bytes),
    }
    ChaCha20Rng::from_seed(seed_bytes)
}
