//! podcheck CLI - print-on-demand PDF preflight

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use podcheck::{report, Error, JsonFormat, Preflight, Report, TrimSize};

/// Exit code when the input could not be loaded.
const EXIT_INPUT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "podcheck")]
#[command(version)]
#[command(about = "Preflight a PDF book for print-on-demand (heuristic)", long_about = None)]
struct Cli {
    /// PDF to check
    #[arg(value_name = "PDF", default_value = "project/final_pass/build/final_pass.pdf")]
    pdf: PathBuf,

    /// Expected trim in inches as WxH, or "none" to skip the trim check
    #[arg(long, value_name = "WxH", default_value = "5.5x8.5", env = "PODCHECK_TRIM")]
    trim: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Output compact JSON
    #[arg(long, requires = "json")]
    compact: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Analyse pages on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let report = match check(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", "ERROR".red().bold(), e);
            std::process::exit(EXIT_INPUT_ERROR);
        }
    };

    if let Err(e) = emit(&cli, &report) {
        eprintln!("{}: {}", "ERROR".red().bold(), e);
        std::process::exit(EXIT_INPUT_ERROR);
    }

    std::process::exit(report.exit_code());
}

fn check(cli: &Cli) -> Result<Report, Error> {
    if !cli.pdf.exists() {
        return Err(Error::Other(format!("missing pdf: {}", cli.pdf.display())));
    }

    let mut preflight = Preflight::new().with_expected_trim(parse_trim(&cli.trim)?);
    if cli.sequential {
        preflight = preflight.sequential();
    }

    log::debug!("checking {} with {:?}", cli.pdf.display(), preflight.options());
    preflight.check(&cli.pdf)
}

/// `none` (or an empty value) disables the trim check.
fn parse_trim(raw: &str) -> Result<Option<TrimSize>, Error> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    TrimSize::parse(raw).map(Some)
}

fn emit(cli: &Cli, report: &Report) -> Result<(), Error> {
    if cli.json {
        let format = if cli.compact {
            JsonFormat::Compact
        } else {
            JsonFormat::Pretty
        };
        let json = report::to_json(report, format)?;
        return match &cli.output {
            Some(path) => {
                fs::write(path, json)?;
                print_saved(path);
                Ok(())
            }
            None => {
                println!("{}", json);
                Ok(())
            }
        };
    }

    let text = report::to_text(report);
    let verdict = report::verdict(report);
    match &cli.output {
        Some(path) => {
            fs::write(path, format!("{}{}\n", text, verdict))?;
            print_saved(path);
            print_verdict(report, &verdict);
        }
        None => {
            print!("{}", colorize(&text));
            print_verdict(report, &verdict);
        }
    }
    Ok(())
}

fn print_saved(path: &std::path::Path) {
    eprintln!("{} {}", "Saved:".green(), path.display());
}

fn print_verdict(report: &Report, verdict: &str) {
    if report.passed {
        println!("{}", verdict.green().bold());
    } else {
        println!("{}", verdict.red().bold());
    }
}

/// Highlight FAIL lines of the console report.
fn colorize(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.starts_with("FAIL") {
                format!("{}\n", line.red())
            } else {
                format!("{}\n", line)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trim_none() {
        assert_eq!(parse_trim("none").unwrap(), None);
        assert_eq!(parse_trim("NONE").unwrap(), None);
        assert_eq!(parse_trim("").unwrap(), None);
    }

    #[test]
    fn test_parse_trim_value() {
        assert_eq!(parse_trim("6x9").unwrap(), Some(TrimSize::new(6.0, 9.0)));
        assert!(matches!(parse_trim("six by nine"), Err(Error::InvalidTrim(_))));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["podcheck"]);
        assert_eq!(
            cli.pdf,
            PathBuf::from("project/final_pass/build/final_pass.pdf")
        );
        assert!(!cli.json);
        assert!(!cli.sequential);
    }

    #[test]
    fn test_cli_compact_requires_json() {
        assert!(Cli::try_parse_from(["podcheck", "book.pdf", "--compact"]).is_err());
        assert!(Cli::try_parse_from(["podcheck", "book.pdf", "--json", "--compact"]).is_ok());
    }

    #[test]
    fn test_colorize_keeps_lines() {
        colored::control::set_override(false);
        let text = "pages=1 encrypted=false\nFAIL margin_violations=1\n";
        assert_eq!(colorize(text), text);
    }
}
