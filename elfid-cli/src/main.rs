use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elfid_core::{get_info, DynamicInfo, ElfObject, HashBundle, HashRequest};
use serde::Serialize;

/// ELF dependency and fingerprint inspector
#[derive(Parser)]
#[command(
    name = "elfid",
    about = "Inspect ELF dynamic metadata and content fingerprints",
    version,
    author
)]
struct Cli {
    /// Path to an ELF object
    #[arg(required = true)]
    path: PathBuf,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show header identity (type, bits, arch, byte order, OS ABI)
    Info,
    /// Show needed libraries, search paths and symbol versions
    Dynamic,
    /// List all sections
    Sections,
    /// Compute content digests (all of them unless narrowed by flags)
    Hash {
        /// Legacy single digest
        #[arg(long)]
        elfhash: bool,
        /// SHA-256 signed/unsigned pair
        #[arg(long)]
        sha256: bool,
        /// SHA-512/256 signed/unsigned pair
        #[arg(long = "sha512t-256")]
        sha512t_256: bool,
    },
}

#[derive(Serialize)]
struct InfoView {
    #[serde(rename = "type")]
    kind: &'static str,
    bits: u32,
    arch: &'static str,
    end: &'static str,
    osabi: &'static str,
}

#[derive(Serialize)]
struct DepView<'a> {
    name: &'a str,
    lazy: bool,
    versions: &'a [String],
}

#[derive(Serialize)]
struct DynamicView<'a> {
    deps: Vec<DepView<'a>>,
    runpath: Option<&'a str>,
    rpath: Option<&'a str>,
    obj_type: Option<&'static str>,
    #[serde(rename = "def")]
    base_version: Option<&'a str>,
    #[serde(rename = "vers")]
    provided_versions: &'a [String],
}

#[derive(Serialize)]
struct HashView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    elfhash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash_sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uhash_sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash_sha512t_256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uhash_sha512t_256: Option<&'a str>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut file = File::open(&cli.path)
        .with_context(|| format!("failed to open {}", cli.path.display()))?;

    match cli.command {
        Command::Info => {
            let info = get_info(&mut file)?;
            if cli.json {
                let view = InfoView {
                    kind: info.kind.as_str(),
                    bits: info.bits,
                    arch: info.arch.as_str(),
                    end: info.data.as_str(),
                    osabi: info.osabi.as_str(),
                };
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{:<12} {}", "Type:", info.kind);
                println!("{:<12} {}", "Bits:", info.bits);
                println!("{:<12} {}", "Arch:", info.arch);
                println!("{:<12} {}", "Byte order:", info.data);
                println!("{:<12} {}", "OS ABI:", info.osabi);
            }
        }

        Command::Dynamic => {
            let obj = ElfObject::open(file)?;
            let dynamic = obj.dynamic_info()?;
            if cli.json {
                print_dynamic_json(&dynamic)?;
            } else {
                print_dynamic(&dynamic);
            }
        }

        Command::Sections => {
            let obj = ElfObject::open(file)?;
            if obj.sections().is_empty() {
                println!("No sections found.");
            } else {
                println!(
                    "{:<20} {:<18} {:<10} {:<10} {:<10}",
                    "Section", "Addr", "Size", "Offset", "Flags"
                );
                println!("{}", "-".repeat(80));
                for s in obj.sections() {
                    println!(
                        "{:<20} 0x{:<16x} {:<10x} {:<10x} {:<10x}",
                        s.name, s.addr, s.size, s.offset, s.flags
                    );
                }
            }
        }

        Command::Hash {
            elfhash,
            sha256,
            sha512t_256,
        } => {
            let request = if elfhash || sha256 || sha512t_256 {
                HashRequest {
                    elfhash,
                    sha256,
                    sha512t_256,
                }
            } else {
                HashRequest::all()
            };
            let mut obj = ElfObject::open(file)?;
            let hashes = obj.hashes(request)?;
            if cli.json {
                print_hashes_json(&hashes)?;
            } else {
                print_hashes(&hashes);
            }
        }
    }

    Ok(())
}

fn print_dynamic(dynamic: &DynamicInfo) {
    if dynamic.deps.is_empty() {
        println!("No needed libraries (static object or no dynamic section).");
    } else {
        println!("{:<30} {:<6} {}", "Library", "Lazy", "Versions");
        println!("{}", "-".repeat(70));
        for dep in &dynamic.deps {
            println!(
                "{:<30} {:<6} {}",
                dep.name,
                if dep.lazy { "yes" } else { "no" },
                dep.versions.join(", ")
            );
        }
    }
    if let Some(path) = dynamic.effective_runpath() {
        println!("Runpath: {path}");
    }
    if let Some(flag) = dynamic.obj_type {
        println!("Object type: {flag}");
    }
    if let Some(base) = &dynamic.base_version {
        println!("Base version: {base}");
    }
    if !dynamic.provided_versions.is_empty() {
        println!("Provides: {}", dynamic.provided_versions.join(", "));
    }
}

fn print_dynamic_json(dynamic: &DynamicInfo) -> Result<()> {
    let view = DynamicView {
        deps: dynamic
            .deps
            .iter()
            .map(|d| DepView {
                name: &d.name,
                lazy: d.lazy,
                versions: &d.versions,
            })
            .collect(),
        runpath: dynamic.effective_runpath(),
        rpath: dynamic.rpath.as_deref(),
        obj_type: dynamic.obj_type.map(|f| f.as_str()),
        base_version: dynamic.base_version.as_deref(),
        provided_versions: &dynamic.provided_versions,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn print_hashes(hashes: &HashBundle) {
    let fields = [
        ("elfhash", &hashes.elfhash),
        ("hash_sha256", &hashes.hash_sha256),
        ("uhash_sha256", &hashes.uhash_sha256),
        ("hash_sha512t_256", &hashes.hash_sha512t_256),
        ("uhash_sha512t_256", &hashes.uhash_sha512t_256),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{label:<18} {value}");
        }
    }
}

fn print_hashes_json(hashes: &HashBundle) -> Result<()> {
    let view = HashView {
        elfhash: hashes.elfhash.as_deref(),
        hash_sha256: hashes.hash_sha256.as_deref(),
        uhash_sha256: hashes.uhash_sha256.as_deref(),
        hash_sha512t_256: hashes.hash_sha512t_256.as_deref(),
        uhash_sha512t_256: hashes.uhash_sha512t_256.as_deref(),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
