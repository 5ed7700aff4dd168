//! munki-promoter - move Munki pkginfo files between catalogs
//!
//! Picks one promotion edge per run (see `--list`), finds every pkginfo whose
//! catalogs match the edge's source, and promotes those that have waited out
//! their deferral. Without `--auto` the pending promotions are shown and
//! confirmed interactively first.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use promoter_core::{
    commit, deliver, pkgsinfo_path, plan, verify_store, webhook_from_env, DeferralConfig,
    Notifier, PromotionPlan, RingGraph, RunSpan, SlackWebhookNotifier, DEFAULT_CONFIG_FILE,
    DEFAULT_MUNKI_ROOT,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "munki-promoter")]
#[command(version = promoter_core::VERSION)]
#[command(about = "Promote Munki pkginfo catalogs between deployment rings", long_about = None)]
struct Cli {
    /// Name of promotion to run, use --list to see possible values
    #[arg(short, long)]
    name: Option<String>,

    /// Get list of possible promotions
    #[arg(short, long)]
    list: bool,

    /// Path to the munki root directory
    #[arg(long, default_value = DEFAULT_MUNKI_ROOT)]
    path: PathBuf,

    /// Run without interaction
    #[arg(short, long)]
    auto: bool,

    /// Deferral configuration file
    #[arg(long, env = "MUNKI_PROMOTER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Listed,
    Usage,
    NothingToDo,
    Promoted(usize),
    UnknownPromotion,
    Declined,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Outcome::UnknownPromotion | Outcome::Declined => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    promoter_core::init_tracing(cli.json, level);

    let notifier = build_notifier();
    let stdin = std::io::stdin();
    let outcome = run(
        &cli,
        notifier.as_deref(),
        stdin.lock(),
        std::io::stdout(),
    )
    .await?;
    Ok(outcome.exit_code())
}

fn build_notifier() -> Option<Box<dyn Notifier>> {
    let url = webhook_from_env()?;
    match SlackWebhookNotifier::new(&url) {
        Ok(n) => Some(Box::new(n)),
        Err(e) => {
            error!("Webhooks disabled: {}", e);
            None
        }
    }
}

async fn run<R: BufRead, W: Write>(
    cli: &Cli,
    notifier: Option<&dyn Notifier>,
    input: R,
    mut out: W,
) -> Result<Outcome> {
    let graph = RingGraph::default();

    if cli.list {
        write!(out, "{}", graph.render_listing())?;
        return Ok(Outcome::Listed);
    }

    let Some(name) = cli.name.as_deref().filter(|n| !n.is_empty()) else {
        write!(out, "{}", Cli::command().render_help())?;
        return Ok(Outcome::Usage);
    };

    let Some(promotion) = graph.edge(name) else {
        writeln!(
            out,
            "Promotion \"{}\" not found, use --list to see valid names.",
            name
        )?;
        return Ok(Outcome::UnknownPromotion);
    };

    let config = DeferralConfig::load(&cli.config)?;
    let pkgsinfo = pkgsinfo_path(&cli.path);
    verify_store(&pkgsinfo)
        .context("Your pkgsinfo path is not valid. Please check the --path value")?;

    let span = RunSpan::enter(promotion.name());
    info!(
        run_id = %span.run_id(),
        version = promoter_core::VERSION,
        "Running {} against {}",
        promotion,
        pkgsinfo.display()
    );
    let pending = plan(&pkgsinfo, promotion, &config, Utc::now())?;

    if !cli.auto {
        if pending.is_empty() {
            writeln!(out, "No promotions found")?;
            return Ok(Outcome::NothingToDo);
        }
        print_pending(&mut out, &pending)?;
        if !ask_yes_no("Do you want to promote these?", input, &mut out)? {
            writeln!(out, "Ok, aborted..")?;
            return Ok(Outcome::Declined);
        }
    }

    let promoted = commit(&pending)?;
    writeln!(out, "{} pkginfo files promoted", promoted.len())?;

    if let Some(notifier) = notifier {
        deliver(notifier, promotion.final_ring(), &promoted).await;
    }
    Ok(Outcome::Promoted(promoted.len()))
}

fn print_pending<W: Write>(out: &mut W, pending: &PromotionPlan) -> std::io::Result<()> {
    writeln!(
        out,
        "***\n* Promoting the catalogs of the following pkgsinfo files to {}\n***",
        pending.promotion.target_rings().join(", ")
    )?;
    for item in pending.results() {
        writeln!(out, "{} - {}", item.name, item.version)?;
    }
    Ok(())
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Ask until the answer parses. End of input counts as "no".
fn ask_yes_no<R: BufRead, W: Write>(question: &str, mut input: R, out: &mut W) -> Result<bool> {
    write!(out, "{} [y/n] ", question)?;
    out.flush()?;
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match parse_yes_no(&line) {
            Some(answer) => return Ok(answer),
            None => {
                writeln!(out, "Please respond with 'y' or 'n'.\n")?;
                out.flush()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use promoter_core::{PackageRecord, Promotion, PromoterError, PromotionResult};
    use std::path::Path;
    use std::sync::Mutex;

    struct Recording {
        rings: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn notify(
            &self,
            ring: &str,
            _results: &[PromotionResult],
        ) -> promoter_core::Result<()> {
            self.rings.lock().unwrap().push(ring.to_string());
            Ok(())
        }
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["munki-promoter"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid args")
    }

    fn repo_with(name: &str, rings: &[&str], age_days: i64) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let pkgsinfo = root.path().join("pkgsinfo");
        std::fs::create_dir_all(&pkgsinfo).unwrap();
        let file = format!("{name}.plist");
        let record = PackageRecord::new(
            &file,
            name,
            "2.0",
            rings,
            Some(Utc::now() - Duration::days(age_days)),
        );
        std::fs::write(pkgsinfo.join(&file), record.to_xml_bytes().unwrap()).unwrap();
        root
    }

    fn rings_on_disk(root: &Path, name: &str) -> Vec<String> {
        let path = root.join("pkgsinfo").join(format!("{name}.plist"));
        promoter_core::store::load_record(&path).unwrap().record.rings
    }

    fn no_config(root: &Path) -> String {
        root.join("absent.yml").display().to_string()
    }

    #[test]
    fn test_version_flag_reports_core_version() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_version(), Some(promoter_core::VERSION));
        assert!(cmd.render_version().contains(promoter_core::VERSION));
    }

    #[test]
    fn test_yes_no_map() {
        for yes in ["y", "YES", "t", "True", "on", "1"] {
            assert_eq!(parse_yes_no(yes), Some(true), "{yes}");
        }
        for no in ["n", "No", "f", "FALSE", "off", "0"] {
            assert_eq!(parse_yes_no(no), Some(false), "{no}");
        }
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn test_ask_reprompts_until_valid() {
        let mut out = Vec::new();
        let answer = ask_yes_no("Go?", "what\nyes\n".as_bytes(), &mut out).unwrap();
        assert!(answer);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Go? [y/n] "));
        assert!(text.contains("Please respond with 'y' or 'n'."));
    }

    #[test]
    fn test_ask_eof_is_no() {
        let mut out = Vec::new();
        assert!(!ask_yes_no("Go?", "".as_bytes(), &mut out).unwrap());
    }

    #[tokio::test]
    async fn test_list_prints_edges() {
        let mut out = Vec::new();
        let outcome = run(&cli(&["--list"]), None, "".as_bytes(), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Listed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("autopkgtostaging:\n   autopkg -> staging"));
    }

    #[tokio::test]
    async fn test_no_name_prints_usage() {
        let mut out = Vec::new();
        let outcome = run(&cli(&[]), None, "".as_bytes(), &mut out).await.unwrap();
        assert_eq!(outcome, Outcome::Usage);
        assert_eq!(outcome.exit_code(), ExitCode::SUCCESS);
        assert!(String::from_utf8(out).unwrap().contains("--name"));
    }

    #[tokio::test]
    async fn test_unknown_promotion_fails() {
        let mut out = Vec::new();
        let outcome = run(&cli(&["-n", "prodtotest"]), None, "".as_bytes(), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::UnknownPromotion);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Promotion \"prodtotest\" not found"));
    }

    #[tokio::test]
    async fn test_missing_store_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().display().to_string();
        let config = no_config(root.path());
        let args = cli(&["-n", "testtostaging", "--path", &path, "--config", &config]);
        let err = run(&args, None, "".as_bytes(), Vec::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PromoterError>(),
            Some(PromoterError::StoreMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_interactive_decline_leaves_store_alone() {
        let root = repo_with("Firefox", &["test"], 10);
        let path = root.path().display().to_string();
        let config = no_config(root.path());
        let args = cli(&["-n", "testtostaging", "--path", &path, "--config", &config]);

        let mut out = Vec::new();
        let outcome = run(&args, None, "n\n".as_bytes(), &mut out).await.unwrap();

        assert_eq!(outcome, Outcome::Declined);
        assert_eq!(outcome.exit_code(), ExitCode::FAILURE);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Firefox - 2.0"));
        assert!(text.contains("Ok, aborted.."));
        assert_eq!(rings_on_disk(root.path(), "Firefox"), vec!["test"]);
    }

    #[tokio::test]
    async fn test_interactive_accept_promotes() {
        let root = repo_with("Firefox", &["test"], 10);
        let path = root.path().display().to_string();
        let config = no_config(root.path());
        let args = cli(&["-n", "testtostaging", "--path", &path, "--config", &config]);

        let mut out = Vec::new();
        let outcome = run(&args, None, "y\n".as_bytes(), &mut out).await.unwrap();

        assert_eq!(outcome, Outcome::Promoted(1));
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("1 pkginfo files promoted"));
        assert_eq!(rings_on_disk(root.path(), "Firefox"), vec!["staging"]);
    }

    #[tokio::test]
    async fn test_interactive_nothing_found() {
        let root = repo_with("Firefox", &["test"], 1);
        let path = root.path().display().to_string();
        let config = no_config(root.path());
        let args = cli(&["-n", "testtostaging", "--path", &path, "--config", &config]);

        let mut out = Vec::new();
        let outcome = run(&args, None, "".as_bytes(), &mut out).await.unwrap();
        assert_eq!(outcome, Outcome::NothingToDo);
        assert!(String::from_utf8(out).unwrap().contains("No promotions found"));
    }

    #[tokio::test]
    async fn test_auto_promotes_and_notifies_final_ring() {
        let root = repo_with("Chrome", &["staging"], 15);
        let path = root.path().display().to_string();
        let config = no_config(root.path());
        let args = cli(&[
            "-a",
            "-n",
            "stagingtoproduction",
            "--path",
            &path,
            "--config",
            &config,
        ]);
        let notifier = Recording {
            rings: Mutex::new(Vec::new()),
        };

        let outcome = run(&args, Some(&notifier), "".as_bytes(), Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Promoted(1));
        assert_eq!(rings_on_disk(root.path(), "Chrome"), vec!["production"]);
        assert_eq!(
            *notifier.rings.lock().unwrap(),
            vec![Promotion::StagingToProduction.final_ring().to_string()]
        );
    }
}
