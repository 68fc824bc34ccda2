use std::io::Write;

use anyhow::Result;
use sce_tool::{assert_case, discover_cases};
use tracing::warn;

use crate::CheckArgs;

pub(crate) fn check(args: &CheckArgs, out: &mut dyn Write) -> Result<i32> {
    let cases = discover_cases(&args.cases_dir)?;
    let mut failed = 0usize;

    for case in &cases {
        match assert_case(&case.pack_path, &case.case_path) {
            Ok(report) => writeln!(
                out,
                "PASS {} ({} ticks)",
                case.case_path.display(),
                report.ticks
            )?,
            Err(error) => {
                failed += 1;
                warn!(case = %case.case_path.display(), %error, "case failed");
                writeln!(out, "FAIL {}: {}", case.case_path.display(), error)?;
            }
        }
    }

    writeln!(out, "{} passed, {} failed", cases.len() - failed, failed)?;
    Ok(if failed == 0 { 0 } else { 1 })
}
