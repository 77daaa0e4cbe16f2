//! Text report rendering and the transport seam.
//!
//! Reports are rendered into a fixed buffer owned by the [`Reporter`] and the
//! rendered bytes are lent to the [`Transport`] for the duration of the send,
//! so a new report can never overwrite a message that is still being handed
//! off.

use core::fmt::{self, Write as _};

use heapless::String;

/// Size of the report buffer; both formats stay well below it.
pub const REPORT_CAPACITY: usize = 64;

/// Tag character leading every compact report.
pub const COMPACT_TAG: char = 'h';

/// Serial link the rendered report is handed to.
pub trait Transport {
    /// Queues `bytes` for transmission. Must not block past the current tick.
    fn send_bytes(&mut self, bytes: &[u8]);
}

/// Wire layout of the report line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportFormat {
    /// `h <light:.2> <battery:.2> `, the canonical format.
    Compact,
    /// `Light: <light:.0>% Battery: <battery:.2>v \r\n`
    Verbose,
}

impl ReportFormat {
    /// Attempts to parse a format name.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("compact") {
            Some(Self::Compact)
        } else if tag.eq_ignore_ascii_case("verbose") {
            Some(Self::Verbose)
        } else {
            None
        }
    }
}

/// Values carried by one report. Missing readings render as zero.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ReportValues {
    pub light_percent: f32,
    pub battery_volts: f32,
}

impl ReportValues {
    #[must_use]
    pub fn new(light_percent: Option<f32>, battery_volts: Option<f32>) -> Self {
        Self {
            light_percent: light_percent.unwrap_or(0.0),
            battery_volts: battery_volts.unwrap_or(0.0),
        }
    }
}

/// Errors raised while rendering a report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportError {
    /// The rendered line does not fit in [`REPORT_CAPACITY`] bytes.
    Overflow,
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Overflow => f.write_str("report exceeds buffer"),
        }
    }
}

/// Renders `values` in `format` into `out`.
///
/// # Errors
///
/// Returns [`ReportError::Overflow`] if `out` is too small.
pub fn render<const CAP: usize>(
    out: &mut String<CAP>,
    format: ReportFormat,
    values: ReportValues,
) -> Result<(), ReportError> {
    out.clear();
    let ReportValues {
        light_percent,
        battery_volts,
    } = values;

    let result = match format {
        ReportFormat::Compact => {
            write!(out, "{COMPACT_TAG} {light_percent:.2} {battery_volts:.2} ")
        }
        ReportFormat::Verbose => {
            write!(out, "Light: {light_percent:.0}% Battery: {battery_volts:.2}v \r\n")
        }
    };

    result.map_err(|_| {
        out.clear();
        ReportError::Overflow
    })
}

/// Owns the report buffer and the chosen format.
pub struct Reporter {
    format: ReportFormat,
    buffer: String<REPORT_CAPACITY>,
}

impl Reporter {
    #[must_use]
    pub const fn new(format: ReportFormat) -> Self {
        Self {
            format,
            buffer: String::new(),
        }
    }

    /// Returns the configured format.
    #[must_use]
    pub const fn format(&self) -> ReportFormat {
        self.format
    }

    /// Renders `values` and hands the rendered bytes to `transport`.
    ///
    /// Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Overflow`] without sending anything when the
    /// line does not fit.
    pub fn send<X>(&mut self, transport: &mut X, values: ReportValues) -> Result<usize, ReportError>
    where
        X: Transport + ?Sized,
    {
        render(&mut self.buffer, self.format, values)?;
        transport.send_bytes(self.buffer.as_bytes());
        Ok(self.buffer.len())
    }

    /// Returns the most recently rendered line.
    #[must_use]
    pub fn last_line(&self) -> &str {
        self.buffer.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capture {
        sent: String<REPORT_CAPACITY>,
        sends: usize,
    }

    impl Transport for Capture {
        fn send_bytes(&mut self, bytes: &[u8]) {
            self.sent.clear();
            let text = core::str::from_utf8(bytes).expect("report is ascii");
            self.sent.push_str(text).expect("fits");
            self.sends += 1;
        }
    }

    #[test]
    fn compact_report_leads_with_tag_and_light() {
        let mut line = String::<REPORT_CAPACITY>::new();
        render(
            &mut line,
            ReportFormat::Compact,
            ReportValues::new(Some(25.0), Some(3.3)),
        )
        .expect("fits");
        assert_eq!(line.as_str(), "h 25.00 3.30 ");
    }

    #[test]
    fn verbose_report_rounds_light_to_whole_percent() {
        let mut line = String::<REPORT_CAPACITY>::new();
        render(
            &mut line,
            ReportFormat::Verbose,
            ReportValues::new(Some(41.7), Some(2.954)),
        )
        .expect("fits");
        assert_eq!(line.as_str(), "Light: 42% Battery: 2.95v \r\n");
    }

    #[test]
    fn missing_readings_render_as_zero() {
        let mut line = String::<REPORT_CAPACITY>::new();
        render(&mut line, ReportFormat::Compact, ReportValues::new(None, None)).expect("fits");
        assert_eq!(line.as_str(), "h 0.00 0.00 ");
    }

    #[test]
    fn overflow_is_reported_and_buffer_cleared() {
        let mut line = String::<8>::new();
        let result = render(
            &mut line,
            ReportFormat::Verbose,
            ReportValues::new(Some(99.0), Some(4.2)),
        );
        assert_eq!(result, Err(ReportError::Overflow));
        assert!(line.is_empty());
    }

    #[test]
    fn reporter_sends_only_rendered_bytes() {
        let mut reporter = Reporter::new(ReportFormat::Compact);
        let mut transport = Capture {
            sent: String::new(),
            sends: 0,
        };

        let sent = reporter
            .send(&mut transport, ReportValues::new(Some(7.5), Some(3.0)))
            .expect("fits");

        assert_eq!(sent, "h 7.50 3.00 ".len());
        assert_eq!(transport.sent.as_str(), "h 7.50 3.00 ");
        assert_eq!(transport.sends, 1);
        assert_eq!(reporter.last_line(), "h 7.50 3.00 ");
    }

    #[test]
    fn format_tags_parse_case_insensitively() {
        assert_eq!(ReportFormat::from_tag("Compact"), Some(ReportFormat::Compact));
        assert_eq!(ReportFormat::from_tag("VERBOSE"), Some(ReportFormat::Verbose));
        assert_eq!(ReportFormat::from_tag("binary"), None);
    }
}
