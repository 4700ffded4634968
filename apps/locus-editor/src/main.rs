//! Locus Editor
//!
//! Opens a scene window and a tools window and clears each to its own color
//! every tick. Frame time is logged once per second.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p locus-editor
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use locus_app::{run_app, AppConfig};

use crate::app::Editor;

const WIDTH: u32 = 960;
const HEIGHT: u32 = 640;

fn main() -> anyhow::Result<()> {
    run_app::<Editor>(
        AppConfig::new("Locus Editor")
            .with_size(WIDTH, HEIGHT)
            .with_windows(2),
    )
}
