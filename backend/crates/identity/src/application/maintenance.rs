//! Throttle State Maintenance
//!
//! Wires the in-memory limiters and cooldowns owned by the use cases into
//! one periodic sweep.

use std::sync::Arc;

use platform::sweep::{Sweepable, Sweeper};

use crate::application::config::IdentityConfig;
use crate::application::otp::OtpService;
use crate::application::password_reset::PasswordResetService;
use crate::domain::repository::{OtpRepository, PasswordResetRepository, UserRepository};

/// Sweeper over the OTP limiter, OTP cooldown and reset limiter.
///
/// Call [`Sweeper::start`] once at process start and stop the returned
/// handle on shutdown.
pub fn throttle_sweeper<R, U, P>(
    otp: &OtpService<R>,
    reset: &PasswordResetService<U, P>,
    config: &IdentityConfig,
) -> Sweeper
where
    R: OtpRepository,
    U: UserRepository,
    P: PasswordResetRepository,
{
    let targets: Vec<Arc<dyn Sweepable>> = vec![otp.limiter(), otp.cooldown(), reset.limiter()];
    Sweeper::new(targets, config.sweep_interval)
}
