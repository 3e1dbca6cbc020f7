// SPDX-License-Identifier: CEPL-1.0
//! winit window that the renderer drives through [`WindowPort`].
//!
//! The event loop is pumped from inside the frame loop rather than owning the
//! thread, so the renderer decides when events are processed.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tessel_render::{RenderSize, WindowPort};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

/// How long one pump may block while the window is minimized.
const MINIMIZED_WAIT: Duration = Duration::from_millis(16);
const STARTUP_PUMPS: u32 = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "tessel".into(),
            width: 1280,
            height: 720,
        }
    }
}

/// Window-side bookkeeping fed by winit events.
#[derive(Debug, Default)]
struct WindowState {
    size: RenderSize,
    resized: bool,
    close_requested: bool,
}

impl WindowState {
    fn apply(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.close_requested = true,
            WindowEvent::Resized(size) => {
                let size = RenderSize::new(size.width, size.height);
                if size != self.size {
                    debug!("window resized to {}x{}", size.width, size.height);
                    self.size = size;
                    self.resized = true;
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => self.resized = true,
            _ => {}
        }
    }
}

struct Handler {
    attributes: WindowAttributes,
    window: Option<Window>,
    create_error: Option<String>,
    state: WindowState,
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.create_error.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                let size = window.inner_size();
                self.state.size = RenderSize::new(size.width, size.height);
                self.window = Some(window);
            }
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().is_some_and(|w| w.id() == window_id) {
            self.state.apply(&event);
        }
    }
}

pub struct DesktopWindow {
    event_loop: EventLoop<()>,
    handler: Handler,
    exited: bool,
}

impl DesktopWindow {
    /// Creates the event loop and pumps it until the window exists.
    pub fn open(config: &WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("create event loop")?;
        let attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        let mut window = Self {
            event_loop,
            handler: Handler {
                attributes,
                window: None,
                create_error: None,
                state: WindowState::default(),
            },
            exited: false,
        };

        for _ in 0..STARTUP_PUMPS {
            window.pump(Some(Duration::from_millis(1)));
            if let Some(e) = &window.handler.create_error {
                bail!("create_window: {e}");
            }
            if window.handler.window.is_some() {
                break;
            }
            if window.exited {
                bail!("event loop exited before the window was created");
            }
        }
        let size = window.framebuffer_size();
        if window.handler.window.is_none() {
            bail!("window was not created after {STARTUP_PUMPS} event pumps");
        }
        info!(title = %config.title, "window open at {}x{}", size.width, size.height);
        Ok(window)
    }

    /// The native window, for surface creation.
    pub fn window(&self) -> Option<&Window> {
        self.handler.window.as_ref()
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if self.exited {
            return;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.handler) {
            debug!(code, "event loop exited");
            self.exited = true;
        }
    }
}

impl WindowPort for DesktopWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.handler.state.size
    }

    fn poll_events(&mut self) {
        let timeout = if self.handler.state.size.is_empty() {
            MINIMIZED_WAIT
        } else {
            Duration::ZERO
        };
        self.pump(Some(timeout));
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.handler.state.resized)
    }

    fn should_close(&self) -> bool {
        self.exited || self.handler.state.close_requested
    }
}
