// SPDX-License-Identifier: Apache-2.0

use cellclean::cleanup_error::CleanupError;
use colored::Colorize;

/// Headline and detail lines for a failed subcommand.
///
/// Stage failures list one detail per failed worker range, and coverage
/// violations one per missing signature; other errors print their full
/// context chain on the headline.
pub fn describe_failure(error: &anyhow::Error) -> (String, Vec<(String, String)>) {
    match error.downcast_ref::<CleanupError>() {
        Some(CleanupError::StageFailed { stage, failures }) => (
            format!("stage '{}' failed in {} worker(s)", stage, failures.len()),
            failures
                .iter()
                .map(|f| {
                    (
                        format!("worker [{}, +{})", f.range.start, f.range.size),
                        f.message.clone(),
                    )
                })
                .collect(),
        ),
        Some(CleanupError::PreconditionViolation { missing }) => (
            format!(
                "{} function(s) missing from the reference library",
                missing.len()
            ),
            missing
                .iter()
                .map(|signature| ("missing".to_string(), signature.clone()))
                .collect(),
        ),
        _ => (format!("{:#}", error), Vec::new()),
    }
}

pub fn report_cli_error_and_exit(
    message: &str,
    subcommand: Option<&str>,
    details: &[(String, String)],
) -> ! {
    let subcommand_str = match subcommand {
        Some(subcommand) => format!("{}: ", subcommand),
        None => String::new(),
    };
    eprintln!("cellclean-driver: {}{}", subcommand_str, message.red().bold());
    for (key, value) in details {
        eprintln!("  {}: {}", key, value);
    }
    std::process::exit(1);
}

pub fn report_failure_and_exit(subcommand: &str, error: &anyhow::Error) -> ! {
    let (message, details) = describe_failure(error);
    report_cli_error_and_exit(&message, Some(subcommand), &details)
}
