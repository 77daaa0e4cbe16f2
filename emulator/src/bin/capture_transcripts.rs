use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Busy)?;
    record_profile(TranscriptProfile::Sleep)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(&profile.options())?;
    let summary = session.run(&mut io::sink())?;
    println!(
        "{}: {} reports, {} wakes ({} spurious)",
        profile.log_path(),
        summary.reports,
        summary.wakes,
        summary.spurious_wakes
    );
    Ok(())
}
