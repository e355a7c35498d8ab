/*
 *  main.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Host: drives the renderer from a tokio interval onto a raster surface
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fs::File;
use std::io::BufWriter;
use std::time::Duration;

use anyhow::Context;
use env_logger::Env;
use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind};

use lyspectrum::clock::{Clock, MonotonicClock};
use lyspectrum::config;
use lyspectrum::display::RasterSurface;
use lyspectrum::metrics::PerformanceMetrics;
use lyspectrum::{LoopControl, RenderLoop, RendererEvent, SpectrumRenderer, SyntheticSource};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (cfg, cli) = config::load()?;
    if cli.dump_config {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    let (width, height) = cfg.surface_size();
    let surface = RasterSurface::new(width, height)?.with_max_fps(cfg.surface_max_fps());

    let clock = MonotonicClock::new();
    let mut renderer = SpectrumRenderer::new(cfg.renderer_config()?, Box::new(clock.clone()))?;
    renderer.initialize(surface)?;
    let seed: u64 = rand::random();
    debug!("synthetic source seed {}", seed);
    renderer.attach_source(Box::new(SyntheticSource::new(seed)));

    let mut render_loop = RenderLoop::new(renderer);
    let refresh_hz = cfg.refresh_hz();
    let deadline_ms = cfg.duration_secs.map(|s| s as f64 * 1000.0);
    info!(
        "rendering {}x{} at {} Hz{}",
        width, height, refresh_hz,
        deadline_ms.map(|d| format!(" for {:.0}s", d / 1000.0)).unwrap_or_default()
    );

    let run = async {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / refresh_hz as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut next_summary = 1000.0;
        loop {
            ticker.tick().await;
            let now = clock.now_ms();
            if deadline_ms.is_some_and(|d| now >= d) {
                info!("run duration reached");
                break;
            }
            if render_loop.on_frame(now) == LoopControl::Stop {
                break;
            }
            for event in render_loop.renderer_mut().drain_events() {
                log_event(&event);
            }
            if now >= next_summary {
                info!("{}", render_loop.renderer().performance_metrics().summary());
                next_summary = now + 1000.0;
            }
        }
    };

    tokio::select! {
        // Handle Unix signals for graceful shutdown
        _ = signal_handler() => {}
        _ = run => {}
    }

    let metrics = render_loop.renderer().performance_metrics();
    info!("final: {}", metrics.summary());
    let surface = render_loop.shutdown();

    if let (Some(path), Some(surface)) = (cfg.snapshot_path.as_ref(), surface.as_ref()) {
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        surface.write_ppm(&mut out).context("writing snapshot")?;
        info!("snapshot written to {}", path.display());
    }
    if let Some(path) = cfg.metrics_path.as_ref() {
        write_metrics(path, &metrics)?;
    }
    Ok(())
}

fn log_event(event: &RendererEvent) {
    match event {
        RendererEvent::QualityChanged { change, preset, band_count } => info!(
            "quality now '{}' ({} bands), {:?}", preset, band_count, change.reason
        ),
        RendererEvent::ResourceFallback { kind, reason } => warn!("{:?} fallback: {}", kind, reason),
        RendererEvent::RenderUnavailable { reason } => warn!("render unavailable: {}", reason),
        other => debug!("{:?}", other),
    }
}

fn write_metrics(path: &std::path::Path, metrics: &PerformanceMetrics) -> anyhow::Result<()> {
    let json = metrics.to_json()?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("metrics written to {}", path.display());
    Ok(())
}

#[cfg(unix)]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}
