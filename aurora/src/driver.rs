use crate::clock::FrameClock;
use crate::pipeline::{PipelineHandle, ShaderSources};
use crate::render::{Gpu, Problem};
use crate::settings::{RenderConfig, Settings};
use crate::surface::{FrameRequest, Scaling, Surface, SurfaceDimensions};
use crate::uniforms;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Running,
    Suspended,
    Destroyed,
}

struct Active<G: Gpu> {
    context: Rc<G>,
    pipeline: PipelineHandle<G>,
    clock: FrameClock,
}

/// Owns the pipeline and runs it, one host frame callback at a time.
///
/// All methods are meant to be called from the host's UI thread, in response
/// to the host's own events: mount, frame callbacks, resizes, visibility and
/// context changes. The driver never blocks and never panics on GPU failure;
/// a failed setup leaves it `Uninitialized` with the problem recorded.
pub struct Driver<S: Surface> {
    surface: S,
    config: RenderConfig,
    scaling: Scaling,
    shaders: ShaderSources<'static>,

    state: State,
    active: Option<Active<S::Gpu>>,
    pending_frame: Option<FrameRequest>,
    listening: bool,
    dimensions: SurfaceDimensions,

    failure: Option<Problem>,
    awaiting_restore: bool,
}

impl<S: Surface> Drop for Driver<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<S: Surface> Driver<S> {
    pub fn new(surface: S, settings: &Settings) -> Self {
        Self {
            surface,
            config: RenderConfig::from(settings),
            scaling: settings.scaling(),
            shaders: ShaderSources::default(),
            state: State::Uninitialized,
            active: None,
            pending_frame: None,
            listening: false,
            dimensions: SurfaceDimensions::default(),
            failure: None,
            awaiting_restore: false,
        }
    }

    /// Replace the built-in shaders. Takes effect on the next mount.
    pub fn with_shaders(mut self, shaders: ShaderSources<'static>) -> Self {
        self.shaders = shaders;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The problem that stopped the driver, if any.
    pub fn failure(&self) -> Option<&Problem> {
        self.failure.as_ref()
    }

    pub fn dimensions(&self) -> SurfaceDimensions {
        self.dimensions
    }

    pub fn program(&self) -> Option<<S::Gpu as Gpu>::Program> {
        self.active
            .as_ref()
            .and_then(|active| active.pipeline.program())
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Build the pipeline and start the frame loop.
    ///
    /// Does nothing unless the driver is fresh: a driver that failed or was
    /// destroyed stays that way.
    pub fn mount(&mut self, now: f64) {
        if self.state != State::Uninitialized || self.failure.is_some() || self.awaiting_restore {
            log::debug!("Ignoring mount in state {:?}", self.state);
            return;
        }

        if let Err(problem) = self.start(FrameClock::new(now)) {
            self.fail(problem);
        }
    }

    /// Run one frame. Call this when the host fires the callback requested
    /// by the driver.
    pub fn frame(&mut self, now: f64) {
        // The request has fired, whatever happens next
        self.pending_frame = None;

        if self.state != State::Running {
            return;
        }

        if self.surface.is_context_lost() {
            // The host will fire its restore event; rebuilding now would fail
            if self.surface.restores_lost_context() {
                self.context_lost();
                return;
            }
            self.recover();
            if self.state != State::Running {
                return;
            }
        }

        if let Some(active) = self.active.as_mut() {
            let elapsed = active.clock.tick(now);
            active.pipeline.use_program();
            if let Some(locations) = active.pipeline.uniforms() {
                uniforms::bind(
                    active.context.as_ref(),
                    locations,
                    &self.config,
                    elapsed,
                    &self.dimensions,
                );
            }
            active.pipeline.draw();
        }

        self.request_frame();
    }

    /// Recompute the backing buffer size from the surface and update the
    /// viewport. The pipeline is kept.
    pub fn resize(&mut self) {
        if self.state == State::Destroyed {
            return;
        }

        let (width, height) = self.surface.logical_size();
        let pixel_ratio = self.surface.device_pixel_ratio();
        self.dimensions = SurfaceDimensions::new(width, height, pixel_ratio, &self.scaling);

        let SurfaceDimensions {
            pixel_width,
            pixel_height,
            ..
        } = self.dimensions;
        self.surface.set_backing_size(pixel_width, pixel_height);
        if let Some(active) = &self.active {
            active
                .context
                .viewport(0, 0, pixel_width as i32, pixel_height as i32);
        }

        log::debug!(
            "Resized to {}x{} logical, {}x{} pixels",
            width,
            height,
            pixel_width,
            pixel_height
        );
    }

    /// Apply new settings. Colors, speed and intensity are plain uniform
    /// updates picked up by the next frame.
    pub fn set_settings(&mut self, settings: &Settings) {
        self.set_config(RenderConfig::from(settings));

        let scaling = settings.scaling();
        if scaling != self.scaling {
            self.scaling = scaling;
            if self.active.is_some() {
                self.resize();
            }
        }
    }

    pub fn set_config(&mut self, config: RenderConfig) {
        self.config = config;
    }

    /// Stop requesting frames, for example while the surface is hidden.
    pub fn suspend(&mut self) {
        if self.state == State::Running {
            self.cancel_frame();
            self.state = State::Suspended;
            log::debug!("Suspended");
        }
    }

    /// Pick up the frame loop again. Elapsed time keeps following the wall
    /// clock, so the animation jumps ahead by the time spent suspended.
    pub fn resume(&mut self) {
        if self.state == State::Suspended {
            self.state = State::Running;
            self.request_frame();
            log::debug!("Resumed");
        }
    }

    /// The host reports that the context is gone. The pipeline's ids died
    /// with it; the driver waits for `context_restored`.
    pub fn context_lost(&mut self) {
        if !matches!(self.state, State::Running | State::Suspended) {
            return;
        }

        log::warn!("{}", Problem::ContextLost);
        self.cancel_frame();
        self.forget_pipeline();
        self.state = State::Uninitialized;
        self.awaiting_restore = true;
    }

    /// The host offers a fresh context after a loss. Rebuild and run.
    ///
    /// This also clears a failed in-frame rebuild: the loss it ran into is
    /// the one being restored.
    pub fn context_restored(&mut self, now: f64) {
        if !self.awaiting_restore || self.state != State::Uninitialized {
            return;
        }
        self.awaiting_restore = false;
        self.failure = None;

        if let Err(problem) = self.start(FrameClock::new(now)) {
            self.fail_recovery(problem);
        }
    }

    /// Cancel the pending frame, stop listening for resizes and release the
    /// pipeline. Safe to call in any state, any number of times.
    pub fn destroy(&mut self) {
        if self.state == State::Destroyed {
            return;
        }

        // Cancel before releasing, so no callback can reach a released pipeline
        self.cancel_frame();
        self.stop_listening();
        if let Some(mut active) = self.active.take() {
            active.pipeline.destroy();
        }
        self.awaiting_restore = false;
        self.state = State::Destroyed;
    }

    fn start(&mut self, clock: FrameClock) -> Result<(), Problem> {
        let context = self
            .surface
            .acquire_context()
            .ok_or(Problem::ContextUnavailable)?;
        let pipeline = PipelineHandle::new(&context, &self.shaders)?;

        self.active = Some(Active {
            context,
            pipeline,
            clock,
        });
        self.state = State::Running;

        if !self.listening {
            self.surface.listen_for_resize();
            self.listening = true;
        }
        self.resize();
        self.request_frame();

        Ok(())
    }

    // Rebuild in place after the surface reported a lost context mid-frame.
    // The clock carries over so the animation doesn't restart.
    fn recover(&mut self) {
        log::warn!("{}", Problem::ContextLost);
        let clock = self.active.as_ref().map(|active| active.clock);
        self.forget_pipeline();
        self.state = State::Uninitialized;

        let clock = match clock {
            Some(clock) => clock,
            None => return self.fail_recovery(Problem::ContextLost),
        };
        if let Err(problem) = self.start(clock) {
            self.fail_recovery(problem);
        }
    }

    // A host that restores contexts may still offer one back.
    fn fail_recovery(&mut self, problem: Problem) {
        log::error!("Cannot rebuild the pipeline: {}", problem);
        self.stop(Problem::ContextUnavailable);
        self.awaiting_restore = true;
    }

    fn fail(&mut self, problem: Problem) {
        log::error!("{}", problem);
        self.stop(problem);
    }

    fn stop(&mut self, problem: Problem) {
        self.cancel_frame();
        self.stop_listening();
        if let Some(mut active) = self.active.take() {
            active.pipeline.destroy();
        }
        self.state = State::Uninitialized;
        self.failure = Some(problem);
    }

    fn forget_pipeline(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.pipeline.forget();
        }
    }

    fn request_frame(&mut self) {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(self.surface.request_frame());
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(request) = self.pending_frame.take() {
            self.surface.cancel_frame(request);
        }
    }

    fn stop_listening(&mut self) {
        if self.listening {
            self.surface.stop_listening_for_resize();
            self.listening = false;
        }
    }
}
