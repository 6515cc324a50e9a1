//! forge – command-line ebook page generator.
//!
//! ```text
//! forge generate request.json [--config engine.json] [--out DIR] [--font Georgia=fonts/Georgia.ttf]
//! forge plan request.json
//! ```
//!
//! `generate` prints the manifest JSON on stdout; `plan` prints the page plan
//! without reading assets or writing anything. Set `RUST_LOG=debug` to see
//! page-break decisions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ebook_forge::assets::TemplateDirectory;
use ebook_forge::config::{EngineConfig, FontSource};
use ebook_forge::error::Result;
use ebook_forge::fonts::FontManager;
use ebook_forge::pipeline::{generate_ebook, plan_ebook, GenerateRequest};

#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "Paginate rich text onto ebook page images", long_about = None)]
#[command(after_help = "EXAMPLES:
    forge generate request.json --out ebooks      Render cover, pages and manifest
    forge plan request.json                        Show where every line lands")]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Register a font: FAMILY[:bold][:italic]=PATH (repeatable)
    #[arg(long = "font", global = true, value_name = "SPEC", value_parser = parse_font)]
    fonts: Vec<FontSource>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the cover and every content page, then write manifest.json
    Generate {
        /// Generation request (JSON)
        request: PathBuf,

        /// Output root; one folder per ebook is created inside it
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Render pages on the current thread only
        #[arg(long)]
        sequential: bool,
    },
    /// Print the page plan as JSON without rendering
    Plan {
        /// Generation request (JSON)
        request: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let report = serde_json::to_string(&e.report()).unwrap_or_else(|_| e.to_string());
            eprintln!("error: {report}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.fonts.extend(cli.fonts);
    let fonts = FontManager::from_sources(&config.fonts)?;
    if !fonts.has_real_fonts() {
        log::info!("no font files configured, drawing with placeholder glyphs");
    }

    match cli.command {
        Command::Plan { request } => {
            let request = GenerateRequest::from_json_file(&request)?;
            plan_ebook(&request, &config, &fonts)?.to_json()
        }
        Command::Generate {
            request,
            out,
            sequential,
        } => {
            let mut request = GenerateRequest::from_json_file(&request)?;
            if let Some(out) = out {
                config.output_root = out;
            }
            if sequential {
                config.parallel_render = false;
            }
            let ebook_id = request
                .ebook_id
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
                .clone();
            let run_dir = config.output_root.join(&ebook_id);
            let existed = run_dir.exists();

            let templates = TemplateDirectory::new(&config.template_root);
            match generate_ebook(&request, &config, &fonts, &templates) {
                Ok(manifest) => manifest.to_json(),
                Err(e) => {
                    if !existed && run_dir.exists() {
                        log::warn!("removing partial output {}", run_dir.display());
                        if let Err(rm) = std::fs::remove_dir_all(&run_dir) {
                            log::warn!("cleanup failed: {rm}");
                        }
                    }
                    Err(e)
                }
            }
        }
    }
}

fn parse_font(spec: &str) -> std::result::Result<FontSource, String> {
    let (face, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY=PATH, got {spec:?}"))?;
    let mut parts = face.split(':');
    let family = parts.next().unwrap_or_default().trim();
    if family.is_empty() {
        return Err("font family is empty".to_string());
    }
    let mut source = FontSource {
        family: family.to_string(),
        path: PathBuf::from(path),
        bold: false,
        italic: false,
    };
    for flag in parts {
        match flag {
            "bold" => source.bold = true,
            "italic" => source.italic = true,
            other => return Err(format!("unknown font flag {other:?}")),
        }
    }
    Ok(source)
}
