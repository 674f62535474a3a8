//! Chooses between the GPU globe and the software fallback.
//!
//! The decision is a one-way latch per session unless the policy allows a retry:
//! once the alternate renderer is chosen, GPU texture loads stop.

pub mod software;

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// When false the GPU path is never attempted.
    pub gpu_enabled: bool,
    /// Bounded wait for the diffuse map to reach the GPU.
    pub texture_timeout: Duration,
    /// Whether [`FallbackController::retry_gpu`] may leave the fallback.
    pub allow_gpu_retry: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            gpu_enabled: true,
            texture_timeout: Duration::from_secs(3),
            allow_gpu_retry: false,
        }
    }
}

/// The GPU capabilities the controller needs to ask about.
pub trait GpuProbe {
    /// Acquires a device. `false` means no usable GPU hardware.
    fn hardware_available(&mut self) -> bool;
    /// Compiles the render pipelines. `false` if neither shader pair compiled.
    fn compile_shaders(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    HardwareAbsent,
    ShaderCompileFailed,
    TextureTimeout,
    GpuFailed,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallbackReason::Disabled => "GPU rendering disabled by configuration",
            FallbackReason::HardwareAbsent => "no GPU adapter available",
            FallbackReason::ShaderCompileFailed => "shader compilation failed",
            FallbackReason::TextureTimeout => "diffuse texture did not load in time",
            FallbackReason::GpuFailed => "GPU renderer failed",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    /// `start` has not run yet.
    Idle,
    /// GPU path is up and waiting for its diffuse map.
    AwaitingTextures { since: Instant },
    Gpu,
    Alternate(FallbackReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererChoice {
    Gpu,
    Alternate,
}

#[derive(Debug)]
pub struct FallbackController {
    policy: FallbackPolicy,
    state: FallbackState,
}

impl FallbackController {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self { policy, state: FallbackState::Idle }
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn choice(&self) -> RendererChoice {
        match self.state {
            FallbackState::AwaitingTextures { .. } | FallbackState::Gpu => RendererChoice::Gpu,
            FallbackState::Idle | FallbackState::Alternate(_) => RendererChoice::Alternate,
        }
    }

    /// Hardware first, then shaders; the texture wait starts at `now` on success.
    pub fn start(&mut self, probe: &mut dyn GpuProbe, now: Instant) -> RendererChoice {
        if !self.policy.gpu_enabled {
            self.latch(FallbackReason::Disabled);
        } else if !probe.hardware_available() {
            self.latch(FallbackReason::HardwareAbsent);
        } else if !probe.compile_shaders() {
            self.latch(FallbackReason::ShaderCompileFailed);
        } else {
            log::info!(
                "GPU path ready; waiting up to {:?} for the diffuse map",
                self.policy.texture_timeout
            );
            self.state = FallbackState::AwaitingTextures { since: now };
        }
        self.choice()
    }

    /// The diffuse map reached the GPU.
    pub fn on_texture_loaded(&mut self) {
        if let FallbackState::AwaitingTextures { .. } = self.state {
            log::info!("Diffuse map loaded; GPU renderer confirmed");
            self.state = FallbackState::Gpu;
        }
    }

    /// Checks the texture deadline.
    pub fn poll(&mut self, now: Instant) -> RendererChoice {
        if let FallbackState::AwaitingTextures { since } = self.state {
            if now.saturating_duration_since(since) >= self.policy.texture_timeout {
                self.latch(FallbackReason::TextureTimeout);
            }
        }
        self.choice()
    }

    /// The GPU renderer hit an unrecoverable error mid-session.
    pub fn report_failure(&mut self) {
        if self.choice() == RendererChoice::Gpu {
            self.latch(FallbackReason::GpuFailed);
        }
    }

    /// Whether GPU texture uploads should still be attempted.
    pub fn gpu_textures_wanted(&self) -> bool {
        self.choice() == RendererChoice::Gpu || self.policy.allow_gpu_retry
    }

    /// Leaves the fallback if the policy allows it and the probe succeeds again.
    pub fn retry_gpu(&mut self, probe: &mut dyn GpuProbe, now: Instant) -> RendererChoice {
        if let FallbackState::Alternate(reason) = self.state {
            if !self.policy.allow_gpu_retry || reason == FallbackReason::Disabled {
                return self.choice();
            }
            log::info!("Retrying GPU path after fallback ({reason})");
            return self.start(probe, now);
        }
        self.choice()
    }

    fn latch(&mut self, reason: FallbackReason) {
        log::warn!("Switching to the software renderer: {reason}");
        self.state = FallbackState::Alternate(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeProbe {
        hardware: bool,
        shaders: bool,
        hardware_calls: u32,
        compile_calls: u32,
    }

    impl FakeProbe {
        fn new(hardware: bool, shaders: bool) -> Self {
            Self { hardware, shaders, ..Default::default() }
        }
    }

    impl GpuProbe for FakeProbe {
        fn hardware_available(&mut self) -> bool {
            self.hardware_calls += 1;
            self.hardware
        }

        fn compile_shaders(&mut self) -> bool {
            self.compile_calls += 1;
            self.shaders
        }
    }

    #[test]
    fn no_hardware_skips_compilation() {
        let mut probe = FakeProbe::new(false, true);
        let mut ctl = FallbackController::new(FallbackPolicy::default());

        assert_eq!(ctl.start(&mut probe, Instant::now()), RendererChoice::Alternate);
        assert_eq!(ctl.state(), FallbackState::Alternate(FallbackReason::HardwareAbsent));
        assert_eq!(probe.compile_calls, 0);
    }

    #[test]
    fn disabled_gpu_never_probes() {
        let mut probe = FakeProbe::new(true, true);
        let policy = FallbackPolicy { gpu_enabled: false, ..Default::default() };
        let mut ctl = FallbackController::new(policy);

        assert_eq!(ctl.start(&mut probe, Instant::now()), RendererChoice::Alternate);
        assert_eq!(probe.hardware_calls, 0);
    }

    #[test]
    fn compile_failure_falls_back() {
        let mut probe = FakeProbe::new(true, false);
        let mut ctl = FallbackController::new(FallbackPolicy::default());
        ctl.start(&mut probe, Instant::now());
        assert_eq!(ctl.state(), FallbackState::Alternate(FallbackReason::ShaderCompileFailed));
    }

    #[test]
    fn texture_timeout_latches() {
        let t0 = Instant::now();
        let mut probe = FakeProbe::new(true, true);
        let mut ctl = FallbackController::new(FallbackPolicy::default());

        assert_eq!(ctl.start(&mut probe, t0), RendererChoice::Gpu);
        assert_eq!(ctl.poll(t0 + Duration::from_millis(2999)), RendererChoice::Gpu);
        assert_eq!(ctl.poll(t0 + Duration::from_secs(3)), RendererChoice::Alternate);
        assert!(!ctl.gpu_textures_wanted());

        // A late texture does not undo the latch.
        ctl.on_texture_loaded();
        assert_eq!(ctl.choice(), RendererChoice::Alternate);
        assert_eq!(ctl.retry_gpu(&mut probe, t0 + Duration::from_secs(10)), RendererChoice::Alternate);
        assert_eq!(probe.hardware_calls, 1);
    }

    #[test]
    fn loaded_texture_cancels_deadline() {
        let t0 = Instant::now();
        let mut ctl = FallbackController::new(FallbackPolicy::default());
        ctl.start(&mut FakeProbe::new(true, true), t0);
        ctl.on_texture_loaded();

        assert_eq!(ctl.poll(t0 + Duration::from_secs(60)), RendererChoice::Gpu);
        assert_eq!(ctl.state(), FallbackState::Gpu);

        ctl.report_failure();
        assert_eq!(ctl.state(), FallbackState::Alternate(FallbackReason::GpuFailed));
    }

    #[test]
    fn retry_when_policy_allows() {
        let t0 = Instant::now();
        let policy = FallbackPolicy { allow_gpu_retry: true, ..Default::default() };
        let mut ctl = FallbackController::new(policy);

        ctl.start(&mut FakeProbe::new(true, true), t0);
        ctl.poll(t0 + Duration::from_secs(5));
        assert!(ctl.gpu_textures_wanted());

        let choice = ctl.retry_gpu(&mut FakeProbe::new(true, true), t0 + Duration::from_secs(6));
        assert_eq!(choice, RendererChoice::Gpu);
    }
}
