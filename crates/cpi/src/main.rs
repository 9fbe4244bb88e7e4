//! Entry point for the cloud provider interface executable.
//!
//! The binary delegates to [`cpi::launch`], which loads configuration,
//! installs telemetry and serves requests from stdin. Startup failures are
//! reported on stderr with a non-zero exit status.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cpi::launch() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            cpi::report_failure(&mut io::stderr().lock(), &error);
            ExitCode::FAILURE
        }
    }
}
