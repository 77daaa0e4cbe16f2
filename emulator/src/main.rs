mod session;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use node_core::acquisition::WaitPolicy;
use node_core::config::{BlinkPattern, DEFAULT_BLINK_PERIOD};
use node_core::report::ReportFormat;
use session::{PULSE_ON_TIME, Session, SessionOptions};

const USAGE: &str = "Usage: node-emulator [--seconds <n>] [--policy <busy|sleep>] \
[--format <compact|verbose>] [--blink <toggle|pulse>] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    writeln!(
        writer,
        "Sensor node emulator: {}s of virtual time, policy={:?}, format={:?}",
        options.seconds, options.policy, options.format
    )?;

    let mut session = Session::new(&options)?;
    let summary = session.run(&mut writer)?;

    writeln!(
        writer,
        "Done: {} ticks, {} reports, {} readings, {} LED changes (lit={}), \
         {} conversions, {} wakes ({} spurious).",
        summary.ticks,
        summary.reports,
        summary.readings,
        summary.led_changes,
        session.node().led().is_lit(),
        summary.conversions,
        summary.wakes,
        summary.spurious_wakes
    )?;
    Ok(())
}

fn parse_args<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = SessionOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--seconds" => {
                let raw = value()?;
                options.seconds = raw
                    .parse()
                    .map_err(|_| format!("Invalid --seconds value `{raw}`"))?;
            }
            "--policy" => options.policy = parse_policy(&value()?)?,
            "--format" => {
                let raw = value()?;
                options.format = ReportFormat::from_tag(&raw)
                    .ok_or_else(|| format!("Unknown report format `{raw}`"))?;
            }
            "--blink" => options.blink = parse_blink(&value()?)?,
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}

fn parse_policy(tag: &str) -> Result<WaitPolicy, String> {
    if tag.eq_ignore_ascii_case("busy") {
        Ok(WaitPolicy::BusyWait)
    } else if tag.eq_ignore_ascii_case("sleep") {
        Ok(WaitPolicy::LowPower)
    } else {
        Err(format!("Unknown wait policy `{tag}`"))
    }
}

fn parse_blink(tag: &str) -> Result<BlinkPattern, String> {
    if tag.eq_ignore_ascii_case("toggle") {
        Ok(BlinkPattern::Toggle {
            period: DEFAULT_BLINK_PERIOD,
        })
    } else if tag.eq_ignore_ascii_case("pulse") {
        Ok(BlinkPattern::Pulse {
            period: DEFAULT_BLINK_PERIOD,
            on_time: PULSE_ON_TIME,
        })
    } else {
        Err(format!("Unknown blink pattern `{tag}`"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(parse_args(Vec::new()), Ok(SessionOptions::default()));
    }

    #[test]
    fn accepts_separate_and_inline_values() {
        let options = parse_args(args(&[
            "--seconds",
            "4",
            "--policy=busy",
            "--format",
            "verbose",
            "--blink=pulse",
            "--transcript",
            "out.log",
        ]))
        .expect("valid arguments");

        assert_eq!(options.seconds, 4);
        assert_eq!(options.policy, WaitPolicy::BusyWait);
        assert_eq!(options.format, ReportFormat::Verbose);
        assert_eq!(
            options.blink,
            BlinkPattern::Pulse {
                period: Duration::from_secs(1),
                on_time: PULSE_ON_TIME,
            }
        );
        assert_eq!(options.transcript, Some(PathBuf::from("out.log")));
    }

    #[test]
    fn rejects_unknown_flags_and_values() {
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["--policy", "idle"])).is_err());
        assert!(parse_args(args(&["--seconds", "soon"])).is_err());
        assert!(parse_args(args(&["--seconds"])).is_err());
    }
}
