//! Build-time configuration of the sensor node.

use core::time::Duration;

use crate::acquisition::{AcquisitionConfig, WaitPolicy};
use crate::report::ReportFormat;

/// Rate of the hardware tick interrupt.
pub const DEFAULT_TICK_RATE_HZ: u32 = 8_000;

/// One acquisition step every quarter second gives a full battery and light
/// cycle per second.
pub const DEFAULT_ACQUISITION_PERIOD: Duration = Duration::from_millis(250);

pub const DEFAULT_REPORT_PERIOD: Duration = Duration::from_secs(1);

pub const DEFAULT_BLINK_PERIOD: Duration = Duration::from_secs(1);

/// How the status LED is driven.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlinkPattern {
    /// Invert the LED once per period.
    Toggle { period: Duration },
    /// Light the LED once per period and switch it off after `on_time`.
    Pulse { period: Duration, on_time: Duration },
}

impl BlinkPattern {
    /// Returns the interval between activations.
    #[must_use]
    pub const fn period(&self) -> Duration {
        match self {
            BlinkPattern::Toggle { period } | BlinkPattern::Pulse { period, .. } => *period,
        }
    }
}

impl Default for BlinkPattern {
    fn default() -> Self {
        BlinkPattern::Toggle {
            period: DEFAULT_BLINK_PERIOD,
        }
    }
}

/// Complete node configuration consumed by [`crate::node::register_activities`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeConfig {
    pub tick_rate_hz: u32,
    pub acquisition_period: Duration,
    pub report_period: Duration,
    pub blink: BlinkPattern,
    pub acquisition: AcquisitionConfig,
    pub report_format: ReportFormat,
}

impl NodeConfig {
    /// Returns the configuration of the deployed node.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            acquisition_period: DEFAULT_ACQUISITION_PERIOD,
            report_period: DEFAULT_REPORT_PERIOD,
            blink: BlinkPattern::Toggle {
                period: DEFAULT_BLINK_PERIOD,
            },
            acquisition: AcquisitionConfig::new(),
            report_format: ReportFormat::Compact,
        }
    }

    #[must_use]
    pub const fn with_tick_rate(mut self, tick_rate_hz: u32) -> Self {
        self.tick_rate_hz = tick_rate_hz;
        self
    }

    #[must_use]
    pub const fn with_acquisition_period(mut self, period: Duration) -> Self {
        self.acquisition_period = period;
        self
    }

    #[must_use]
    pub const fn with_report_period(mut self, period: Duration) -> Self {
        self.report_period = period;
        self
    }

    #[must_use]
    pub const fn with_blink(mut self, blink: BlinkPattern) -> Self {
        self.blink = blink;
        self
    }

    #[must_use]
    pub const fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.acquisition = acquisition;
        self
    }

    /// Overrides only the conversion wait policy.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.acquisition = self.acquisition.with_wait_policy(policy);
        self
    }

    #[must_use]
    pub const fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_node() {
        let config = NodeConfig::default();
        assert_eq!(config.tick_rate_hz, 8_000);
        assert_eq!(config.acquisition_period, Duration::from_millis(250));
        assert_eq!(config.report_period, Duration::from_secs(1));
        assert_eq!(config.blink.period(), Duration::from_secs(1));
        assert_eq!(config.acquisition.wait_policy, WaitPolicy::LowPower);
        assert_eq!(config.report_format, ReportFormat::Compact);
    }

    #[test]
    fn builders_override_individual_fields() {
        let config = NodeConfig::new()
            .with_wait_policy(WaitPolicy::BusyWait)
            .with_report_format(ReportFormat::Verbose)
            .with_blink(BlinkPattern::Pulse {
                period: Duration::from_secs(2),
                on_time: Duration::from_millis(50),
            });

        assert_eq!(config.acquisition.wait_policy, WaitPolicy::BusyWait);
        assert_eq!(config.acquisition.samples_per_reading(), 8);
        assert_eq!(config.report_format, ReportFormat::Verbose);
        assert_eq!(config.blink.period(), Duration::from_secs(2));
    }
}
