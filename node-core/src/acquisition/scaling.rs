//! Linear conversion of raw ADC codes into engineering units.

/// Number of codes produced by a 10-bit converter.
pub const FULL_SCALE_10_BIT: f32 = 1024.0;

/// Number of codes produced by a 12-bit converter.
pub const FULL_SCALE_12_BIT: f32 = 4096.0;

/// Nominal voltage of the fixed internal reference used for the battery channel.
pub const INTERNAL_REFERENCE_VOLTS: f32 = 1.1;

/// Ratio of the battery divider, `(R_top + R_bottom) / R_bottom`.
pub const BATTERY_DIVIDER_RATIO: f32 = 4.0;

/// Full-scale battery voltage seen through the divider.
pub const BATTERY_SCALE_VOLTS: f32 = INTERNAL_REFERENCE_VOLTS * BATTERY_DIVIDER_RATIO;

/// Full-scale light reading, expressed as a percentage.
pub const LIGHT_SCALE_PERCENT: f32 = 100.0;

/// Converts a raw (possibly averaged) reading into engineering units.
#[inline]
#[must_use]
pub fn scale_reading(raw: f32, scale: f32, full_scale: f32) -> f32 {
    raw * scale / full_scale
}

/// Arithmetic mean of a batch of raw samples, without truncation.
#[must_use]
pub fn mean_of(samples: &[u16]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }

    let total: u32 = samples.iter().copied().map(u32::from).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total as f32 / samples.len() as f32;
    Some(mean)
}
