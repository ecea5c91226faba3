mod preview;
mod styling;
mod tables;

pub use preview::print_preview;
pub use styling::{dim, magenta_bold};

/// Prints the stagecast banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 stagecast"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline status relay")
    );
}
