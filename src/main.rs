//! Starlane preview
//!
//! Natively, renders one frame of a preset through the software raster and
//! writes it as a PPM image:
//!
//! ```text
//! starlane [preset] [out.ppm] [seconds]
//! ```
//!
//! On the web the library's `Backdrop` is the entry point; this binary does
//! nothing there.

#[cfg(not(target_arch = "wasm32"))]
mod preview {
    use std::fs::File;
    use std::io::BufWriter;

    use starlane::config::Preset;
    use starlane::platform::ManualScheduler;
    use starlane::renderer::CpuRaster;
    use starlane::surface::{DeviceProfile, Viewport};
    use starlane::{Engine, EngineError, FrameOutcome};

    const PREVIEW_WIDTH: f64 = 480.0;
    const PREVIEW_HEIGHT: f64 = 270.0;
    /// Frame spacing used to advance the clock to the requested time
    const STEP_MS: f64 = 1000.0 / 60.0;

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let mut args = std::env::args().skip(1);
        let preset: Preset = match args.next() {
            Some(name) => name.parse().map_err(EngineError::Config)?,
            None => Preset::default(),
        };
        let out = args
            .next()
            .unwrap_or_else(|| format!("{}.ppm", preset.as_str()));
        let seconds: f64 = match args.next() {
            Some(s) => s.parse()?,
            None => 2.0,
        };

        log::info!("Rendering '{}' at t={seconds}s to {out}", preset.as_str());

        let viewport = Viewport::new(PREVIEW_WIDTH, PREVIEW_HEIGHT, 1.0);
        let mut engine: Engine<CpuRaster, ManualScheduler> = Engine::new(
            preset.config(),
            viewport,
            DeviceProfile::Standard,
            ManualScheduler::default(),
        );
        engine.mount_with(|request| Ok(CpuRaster::new(request)))?;

        let steps = (seconds.max(0.0) * 1000.0 / STEP_MS).ceil() as u64;
        let mut outcome = FrameOutcome::Skipped;
        for i in 0..=steps {
            outcome = engine.frame(i as f64 * STEP_MS);
            if let FrameOutcome::Stopped(err) = &outcome {
                return Err(err.clone().into());
            }
        }
        log::debug!("Last frame: {outcome:?}");

        let raster = engine.target().ok_or(EngineError::Disposed)?;
        raster.write_ppm(BufWriter::new(File::create(&out)?))?;
        log::info!(
            "Wrote {}x{} image, mean brightness {:.4}",
            raster.size().width,
            raster.size().height,
            raster.mean_brightness()
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = preview::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is `Backdrop`; this is just to satisfy the compiler
}
