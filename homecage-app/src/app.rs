use anyhow::{Context, Result, anyhow};
use chrono::Local;
use homecage_core::{ContactId, Extent, Point, StimulusSet, TrialState};
use homecage_timing::{HighPrecisionTimer, Timer};
use homecage_trial::{
    ContactEvent, EventLogger, InputEvent, InputQueue, Peripherals, StopSentinel, TickOutcome,
    TrialConfig, TrialController,
};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::pacing::{PRECISE_WINDOW, TickPacer};
use crate::render::{FrameRenderer, FrameView, Palette};

type Controller = TrialController<HighPrecisionTimer, ThreadRng>;

#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub fullscreen: bool,
    pub kiosk: bool,
    pub window: (u32, u32),
    pub touch_only: bool,
    pub show_box: bool,
    pub background: [u8; 3],
    pub plate: [u8; 3],
}

pub struct App {
    options: DisplayOptions,
    config: TrialConfig,
    stimuli: Vec<StimulusSet>,
    peripherals: Option<Peripherals>,

    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<FrameRenderer>,
    controller: Option<Controller>,

    queue: InputQueue,
    cursor: Option<Point>,
    pacer: TickPacer,
    last_tick_ns: Option<u64>,
    failure: Option<anyhow::Error>,
    should_exit: bool,
}

fn to_point(position: PhysicalPosition<f64>) -> Point {
    Point::new(position.x.round() as i32, position.y.round() as i32)
}

impl App {
    pub fn new(
        options: DisplayOptions,
        config: TrialConfig,
        stimuli: Vec<StimulusSet>,
        peripherals: Peripherals,
    ) -> Self {
        let queue = InputQueue::new(config.run.input_queue_capacity);
        let pacer = TickPacer::new(config.run.tick_hz, PRECISE_WINDOW);
        Self {
            options,
            config,
            stimuli,
            peripherals: Some(peripherals),
            window: None,
            pixels: None,
            renderer: None,
            controller: None,
            queue,
            cursor: None,
            pacer,
            last_tick_ns: None,
            failure: None,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            tick_hz = self.config.run.tick_hz,
            "starting event loop"
        );
        event_loop.run_app(&mut self)?;
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());

        let mut attributes = Window::default_attributes()
            .with_title("homecage")
            .with_resizable(false);
        if self.options.fullscreen || self.options.kiosk {
            let monitor = monitor.clone().ok_or_else(|| anyhow!("no monitor available"))?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            let (w, h) = self.options.window;
            attributes = attributes
                .with_inner_size(PhysicalSize::new(w, h))
                .with_decorations(false);
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = monitor
                .and_then(|m| m.refresh_rate_millihertz())
                .map(|mhz| f64::from(mhz) / 1000.0),
            "display ready"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(FrameRenderer::new(
            size.width,
            size.height,
            Palette::new(self.options.background, self.options.plate),
            self.options.show_box,
        )?);

        let peripherals = self
            .peripherals
            .take()
            .ok_or_else(|| anyhow!("peripherals already handed to a controller"))?;
        let logger =
            EventLogger::open(&self.config.log, Local::now()).context("failed to open event log")?;
        if let Some(path) = logger.path() {
            info!(path = %path.display(), "event log open");
        }
        let mut controller = TrialController::new(
            self.config.clone(),
            std::mem::take(&mut self.stimuli),
            Extent::new(size.width, size.height),
            HighPrecisionTimer::new(),
            rand::rng(),
            peripherals,
            logger,
            Some(StopSentinel::new(self.config.run.stop_file.clone())),
        )?;
        controller.start()?;
        self.controller = Some(controller);

        if self.options.kiosk {
            window.set_cursor_visible(false);
        }
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn push(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    fn run_tick(&mut self, event_loop: &ActiveEventLoop) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let now = controller.timer().now();
        if let Some(last) = self.last_tick_ns.replace(now) {
            let interval = controller.timer().elapsed(last);
            controller.timer_mut().record_frame(interval);
        }

        match controller.tick(&mut self.queue) {
            Ok(TickOutcome::Continue) => {
                if controller.take_frame_dirty() {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            Ok(TickOutcome::Stop(reason)) => {
                info!(%reason, "stopping run");
                self.finish(event_loop, None);
            }
            Err(err) => self.finish(event_loop, Some(err.into())),
        }
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer), Some(controller)) = (
            self.pixels.as_mut(),
            self.renderer.as_mut(),
            self.controller.as_ref(),
        ) else {
            return Ok(());
        };
        let view = FrameView {
            stimulus_on: controller.state() == TrialState::Show,
            layout: controller.layout(),
            has_images: controller.current_set().has_images(),
            hit_margin_px: controller.config().hit_margin_px,
        };
        let stats = renderer.render_frame(view, pixels.frame_mut(), controller.timer())?;
        pixels.render()?;
        trace!(
            draw_us = stats.draw.as_micros() as u64,
            copy_us = stats.copy.as_micros() as u64,
            total_us = stats.total.as_micros() as u64,
            "frame presented"
        );
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(size.width, size.height)?;
            pixels.resize_buffer(size.width, size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(size.width, size.height)?;
        }
        if let Some(controller) = &mut self.controller {
            controller.resize(Extent::new(size.width, size.height))?;
        }
        info!(width = size.width, height = size.height, "display resized");
        Ok(())
    }

    /// Flushes the log and leaves the event loop. The first failure is kept for `run`.
    fn finish(&mut self, event_loop: &ActiveEventLoop, failure: Option<anyhow::Error>) {
        if self.should_exit {
            return;
        }
        self.should_exit = true;
        if let Some(err) = &failure {
            error!(err = %format!("{err:#}"), "fatal error");
        }

        if let Some(controller) = &mut self.controller {
            if let Err(err) = controller.shutdown() {
                error!(%err, "failed to finalise event log");
            }
            let stats = controller.timer().calibration_stats();
            info!(
                ticks = stats.samples,
                mean_ms = stats.average_frame_time_ns / 1e6,
                jitter_ms = stats.jitter_ns / 1e6,
                min_ms = stats.min_frame_time_ns / 1e6,
                max_ms = stats.max_frame_time_ns / 1e6,
                rate_hz = stats.effective_fps,
                "tick timing"
            );
            if let Some(path) = controller.log_path() {
                info!(path = %path.display(), "saved event log");
            }
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.failure = failure;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_surface(event_loop) {
                self.finish(event_loop, Some(err));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.push(InputEvent::Quit),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                if matches!(
                    event.physical_key,
                    PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ)
                ) {
                    self.push(InputEvent::Quit);
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(to_point(position)),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } if !self.options.touch_only => {
                let event = match state {
                    ElementState::Pressed => ContactEvent::Down {
                        contact: ContactId::Mouse,
                        point: self.cursor,
                    },
                    ElementState::Released => ContactEvent::Up {
                        contact: ContactId::Mouse,
                    },
                };
                self.push(InputEvent::Contact(event));
            }
            WindowEvent::Touch(touch) => {
                let contact = ContactId::Finger(touch.id);
                let event = match touch.phase {
                    TouchPhase::Started => Some(ContactEvent::Down {
                        contact,
                        point: Some(to_point(touch.location)),
                    }),
                    TouchPhase::Ended | TouchPhase::Cancelled => Some(ContactEvent::Up { contact }),
                    TouchPhase::Moved => None,
                };
                if let Some(event) = event {
                    self.push(InputEvent::Contact(event));
                }
            }
            WindowEvent::Resized(size) => {
                if let Err(err) = self.handle_resize(size) {
                    self.finish(event_loop, Some(err));
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render() {
                    warn!(err = %format!("{err:#}"), "frame not presented");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        let Some(controller) = self.controller.as_ref() else {
            return;
        };
        if self.pacer.poll(controller.timer()) {
            self.run_tick(event_loop);
        }
        let wait = match self.controller.as_ref() {
            Some(controller) => self.pacer.until_next(controller.timer()),
            None => self.pacer.interval(),
        };
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + wait));
    }
}
