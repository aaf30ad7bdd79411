// Render the built-in Cornell box to a PNG.
// Run with: cargo run --release --bin lux_render -- [config.json] [output.png]

use anyhow::{anyhow, Context, Result};
use lux_renderer::{cornell_box_with, render, LuxConfig};
use std::env;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => LuxConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => LuxConfig::default(),
    };
    let output = args.get(2).map(String::as_str).unwrap_or("cornell.png");

    log::info!("Starting Lux render");

    let (builder, camera) = cornell_box_with(&config.tracer);
    let camera = camera.with_resolution(config.render.width, config.render.height);
    let scene = builder.build()?;

    let start = Instant::now();
    let image = render(&camera, &scene, &config.render);
    log::info!("Rendered in {:.2?}", start.elapsed());

    let rgba = image::RgbaImage::from_raw(image.width, image.height, image.to_rgba())
        .ok_or_else(|| anyhow!("Image buffer size does not match {}x{}", image.width, image.height))?;
    rgba.save(output)
        .with_context(|| format!("Failed to write {}", output))?;

    log::info!("Saved {}", output);
    Ok(())
}
