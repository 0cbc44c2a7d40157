mod app;
mod camera;
mod canvas;
mod color;
mod config;
mod effects;
mod error;
mod input;
mod lod;
mod math;
mod pools;
mod projector;
mod render;
mod scene;
mod surface;
mod terminal;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
