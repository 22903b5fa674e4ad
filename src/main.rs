use clap::Parser;
use std::path::PathBuf;

use sheetfill_pdf::{AssemblerConfig, DocumentAssembler, Mapping, Registries};

#[derive(Parser)]
#[command(name = "sheetfill-pdf", about = "Fill PDF character-sheet templates from a JSON mapping")]
struct Args {
    /// Mapping file (JSON)
    #[arg(long)]
    mapping: PathBuf,
    /// Provider-specific font directory, searched first
    #[arg(long, default_value = ".")]
    fonts: PathBuf,
    /// Shared font directory (defaults to $SHEETFILL_FONTS, then ./fonts)
    #[arg(long)]
    shared_fonts: Option<PathBuf>,
    /// Base directory for image paths in the mapping
    #[arg(long, default_value = ".")]
    assets: PathBuf,
    /// Output directory (defaults to each template's directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Template PDF files
    #[arg(required = true)]
    templates: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mapping = match Mapping::from_path(&args.mapping) {
        Ok(mapping) => mapping,
        Err(e) => {
            eprintln!("Error: {}: {e}", args.mapping.display());
            std::process::exit(1);
        }
    };
    let mut registries = Registries::new();
    if let Err(e) = mapping.apply(&mut registries) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let mut config = AssemblerConfig::new(&args.fonts, &args.assets);
    if let Some(dir) = &args.shared_fonts {
        config = config.with_shared_fonts(dir);
    }
    let assembler = DocumentAssembler::from_config(&config);

    let mut failed = false;
    for template in &args.templates {
        if !template.is_file() {
            eprintln!("Error: not a file: {}", template.display());
            failed = true;
            continue;
        }
        let output = sheetfill_pdf::output_path(template, args.out_dir.as_deref());
        match sheetfill_pdf::fill_template(&assembler, &registries, template, &output) {
            Ok(()) => println!("{} -> {}", template.display(), output.display()),
            Err(e) => {
                eprintln!("Error: {}: {e}", template.display());
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}
