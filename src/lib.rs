pub mod assemble;
mod error;
pub mod fonts;
pub mod forms;
pub mod geometry;
pub mod images;
pub mod layout;
pub mod mapping;
pub mod model;
pub mod notify;
pub mod pdf;
pub mod pixels;
pub mod registry;
pub mod resource;

pub use assemble::{AssemblerConfig, DocumentAssembler, RenderStage};
pub use error::Error;
pub use mapping::Mapping;
pub use model::{
    ALL_FILES, FieldOptions, HAlign, ImageOptions, ParseContext, Scalar, StyleOptions, VAlign, Value,
};
pub use notify::{LogNotifier, Notifier, RecordingNotifier, Severity};
pub use pixels::PixelSheet;
pub use registry::Registries;

use std::path::{Path, PathBuf};

/// Where the filled copy of `template` goes: `<stem>.filled.pdf`, next to
/// the template unless `out_dir` is given.
pub fn output_path(template: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".to_string());
    let name = format!("{stem}.filled.pdf");
    match out_dir {
        Some(dir) => dir.join(name),
        None => template.with_file_name(name),
    }
}

pub fn fill_template(
    assembler: &DocumentAssembler,
    registries: &Registries,
    input: &Path,
    output: &Path,
) -> Result<(), Error> {
    let template = std::fs::read(input)?;
    let filename = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = assembler.render(&template, &filename, registries)?;
    std::fs::write(output, bytes).map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names() {
        assert_eq!(
            output_path(Path::new("sheets/RemasterPlayerCore.pdf"), None),
            PathBuf::from("sheets/RemasterPlayerCore.filled.pdf")
        );
        assert_eq!(
            output_path(Path::new("sheets/a.pdf"), Some(Path::new("out"))),
            PathBuf::from("out/a.filled.pdf")
        );
    }
}
