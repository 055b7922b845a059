use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::warn;

use pdp_probe::collaborator::AiCollaborator;
use pdp_probe::config::{self, RunSettings};
use pdp_probe::output::OutputDir;
use pdp_probe::report::{ConsoleReporter, Reporter, SilentReporter};
use pdp_probe::{
    CheckRegistry, Executor, ExecutorSettings, OfflineCollaborator, RunOptions, VlmClient, VlmConfig,
    WebDriverConfig, WebDriverPage, check_health, load_catalog, run_pipeline,
};

/// Exit code for usage faults (no target URL)
const EXIT_USAGE: i32 = 2;

/// PDP Probe - AI-assisted product page testing with Playwright script generation
#[derive(Parser, Debug)]
#[command(
    name = "pdp-probe",
    about = "Detect product page capabilities, run matching checks, and generate a Playwright script",
    after_help = "ENVIRONMENT VARIABLES:\n\
        PDP_PROBE_TARGET_URL       Product page used when no URL argument is given\n\
        PDP_PROBE_CATALOG          Test catalog path\n\
        PDP_PROBE_OUTPUT_DIR       Directory for generated scripts and reports\n\
        PDP_PROBE_WEBDRIVER_URL    WebDriver server URL\n\
        PDP_PROBE_HEADLESS         Run the browser headless (true/false)\n\
        PDP_PROBE_VLM_ENDPOINT     VLM API endpoint URL\n\
        PDP_PROBE_VLM_MODEL        VLM model name\n\
        PDP_PROBE_SETTLE_MS        Wait after clicks that change the page (ms)\n\
        RUST_LOG                   Log filter (default: pdp_probe=info)"
)]
struct Args {
    /// Product page URL
    #[arg(env = config::ENV_TARGET_URL)]
    url: Option<String>,

    /// Test catalog JSON [default: PDP_PROBE_CATALOG, else catalogs/pdp_tests.json]
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Output directory for the generated script and run report [default: PDP_PROBE_OUTPUT_DIR, else generated-tests]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// WebDriver server URL
    #[arg(long, env = config::ENV_WEBDRIVER_URL, default_value = config::DEFAULT_WEBDRIVER_URL)]
    webdriver: String,

    /// VLM endpoint URL
    #[arg(long, env = config::ENV_VLM_ENDPOINT, default_value = config::DEFAULT_VLM_ENDPOINT)]
    vlm_endpoint: String,

    /// VLM model name
    #[arg(long, env = config::ENV_VLM_MODEL, default_value = config::DEFAULT_VLM_MODEL)]
    vlm_model: String,

    /// Run without AI: detection degrades to baseline tests, checks use structural locators only
    #[arg(long)]
    no_ai: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Print the run report as JSON instead of progress
    #[arg(long)]
    json: bool,

    /// Print step traces for tests that did not pass
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn catalog_path(&self, run: &RunSettings) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| PathBuf::from(&run.catalog_path))
    }

    fn output_dir(&self, run: &RunSettings) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&run.output_dir))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pdp_probe=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let Some(url) = args.url.clone().filter(|u| !u.trim().is_empty()) else {
        eprintln!("error: no target URL given");
        eprintln!("Usage: pdp-probe <URL>   (or set PDP_PROBE_TARGET_URL)");
        std::process::exit(EXIT_USAGE);
    };

    let run_settings = &config::get().run;
    let catalog = load_catalog(args.catalog_path(run_settings))?;

    let mut ai: Box<dyn AiCollaborator> = if args.no_ai {
        Box::new(OfflineCollaborator)
    } else {
        match check_health(&args.vlm_endpoint, 5) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                warn!(endpoint = %args.vlm_endpoint, "VLM endpoint not responding; detection will degrade");
            }
        }
        Box::new(VlmClient::new(
            VlmConfig::new(&args.vlm_endpoint).model(&args.vlm_model),
        ))
    };

    let webdriver = WebDriverConfig::new(&args.webdriver).headless(!args.headed && config::get().browser.headless);
    let mut page = WebDriverPage::connect(&webdriver)?;

    let executor = Executor::new(CheckRegistry::builtin(), ExecutorSettings::default());
    let options = RunOptions::new(&url);
    let mut reporter: Box<dyn Reporter> = if args.json {
        Box::new(SilentReporter)
    } else {
        Box::new(ConsoleReporter::new().verbose(args.verbose))
    };

    let outcome = run_pipeline(
        &mut page,
        ai.as_mut(),
        &catalog,
        &executor,
        &options,
        reporter.as_mut(),
    );
    if let Err(e) = page.close() {
        warn!(error = %e, "failed to close browser session");
    }
    let report = outcome?;

    let out = OutputDir::new(args.output_dir(run_settings));
    out.init()?;
    let script_path = out.write_script(&report.script)?;
    let report_path = out.write_report(&report)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let summary = report.summary;
        println!(
            "\nResults: {} passed, {} failed, {} errors, {} skipped",
            summary.pass, summary.fail, summary.error, summary.skipped
        );
        println!("Script: {}", script_path.display());
        println!("Report: {}", report_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_default_to_run_settings() {
        let args = Args::try_parse_from(["pdp-probe", "https://shop.example/products/boot"]).unwrap();
        let run = RunSettings {
            catalog_path: "/etc/pdp/catalog.json".to_string(),
            output_dir: "/tmp/pdp-out".to_string(),
        };

        assert_eq!(args.catalog_path(&run), PathBuf::from("/etc/pdp/catalog.json"));
        assert_eq!(args.output_dir(&run), PathBuf::from("/tmp/pdp-out"));
    }

    #[test]
    fn test_path_flags_override_run_settings() {
        let args = Args::try_parse_from([
            "pdp-probe",
            "--catalog",
            "custom.json",
            "-o",
            "out",
            "https://shop.example/products/boot",
        ])
        .unwrap();

        assert_eq!(args.catalog_path(&RunSettings::defaults()), PathBuf::from("custom.json"));
        assert_eq!(args.output_dir(&RunSettings::defaults()), PathBuf::from("out"));
    }
}
