/// Wall-clock time since the pipeline was created.
///
/// Timestamps are host milliseconds, as handed out by `requestAnimationFrame`
/// or `Instant::elapsed`. There is no pause correction: a surface that stops
/// receiving frames for a while resumes at the current wall-clock time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameClock {
    start: f64,
    last_frame: f64,
}

impl FrameClock {
    pub fn new(now: f64) -> Self {
        Self {
            start: now,
            last_frame: now,
        }
    }

    /// Advance to `now` and return the elapsed seconds.
    ///
    /// A host timestamp that runs backwards does not move the clock back.
    pub fn tick(&mut self, now: f64) -> f32 {
        if now > self.last_frame {
            self.last_frame = now;
        }
        self.elapsed()
    }

    pub fn elapsed(&self) -> f32 {
        (0.001 * (self.last_frame - self.start)) as f32
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn last_frame(&self) -> f64 {
        self.last_frame
    }
}
