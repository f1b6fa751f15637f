//! Packaging tools for the poppler Lambda layer.
//!
//! Two pieces: staging a binary with its shared-library dependencies
//! into a `bin/` + `lib/` tree (dependencies resolved via `ldd`), and
//! driving `docker build`/`create`/`cp`/`rm` to extract the finished
//! layer zip from a container image.

mod deps;
mod layer;
mod stage;

pub use deps::{parse_ldd_output, resolve_dependencies};
pub use layer::{build_layer, LayerConfig};
pub use stage::{make_executable, stage, StageSummary};
