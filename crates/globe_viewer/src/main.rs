//! Entry point for the globe viewer.

use anyhow::Result;
use clap::Parser;
use globe_viewer::{
    app::{render_headless, App},
    config::Config,
    renderer::{FrameOutcome, RenderFailure},
};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    if !config.gpu {
        log::info!("GPU disabled; rendering one software frame");
        return render_headless(&config);
    }

    // Without a display there is no window to fall back into either.
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::warn!("No event loop ({e}); rendering one software frame");
            return render_headless(&config);
        }
    };
    let window = match WindowBuilder::new()
        .with_title("Globe Viewer")
        .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(e) => {
            log::warn!("Window creation failed ({e}); rendering one software frame");
            return render_headless(&config);
        }
    };

    let mut app = App::new(config.clone(), window.clone());
    if app.headless_only() {
        drop(app);
        return render_headless(&config);
    }

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::KeyboardInput { ref event, .. }
                    if event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
                {
                    elwt.exit()
                }
                WindowEvent::RedrawRequested => {
                    app.update();
                    match app.render() {
                        Ok(FrameOutcome::Presented | FrameOutcome::Skipped) => {}
                        Err(RenderFailure::OutOfMemory) => {
                            log::error!("GPU out of memory; exiting.");
                            elwt.exit();
                        }
                        Err(e) => log::error!("Render error: {e}"),
                    }
                }
                other => app.handle_event(&other),
            },
            Event::AboutToWait => {
                // Request a redraw each frame.
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
