use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use scenario_kernel_api::{load_profile, load_script, WidgetSession};
use scenario_kernel_widgets::Widget;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const LOG_ENV: &str = "SK_LOG";

#[derive(Debug, Parser)]
#[command(name = "sk")]
#[command(about = "Scenario Kernel CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available widgets.
    Widgets,
    /// Print the session report for a freshly seeded widget.
    Show(ShowArgs),
    /// Replay a command script and print the resulting report.
    Run(RunArgs),
    /// Print the current view as CSV.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct WidgetArgs {
    #[arg(long)]
    widget: String,
    #[arg(long)]
    profile: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    widget: WidgetArgs,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    widget: WidgetArgs,
    #[arg(long)]
    script: PathBuf,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    widget: WidgetArgs,
    #[arg(long)]
    script: Option<PathBuf>,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Widgets => run_widgets(),
        Command::Show(args) => run_show(&args),
        Command::Run(args) => run_script(&args),
        Command::Export(args) => run_export(&args),
    }
}

fn parse_widget(name: &str) -> Result<Widget> {
    Widget::parse(name).ok_or_else(|| {
        let known = Widget::ALL.iter().map(|widget| widget.as_str()).collect::<Vec<_>>();
        anyhow!("unknown widget `{name}` (expected one of: {})", known.join(", "))
    })
}

fn open_session(args: &WidgetArgs) -> Result<WidgetSession> {
    let widget = parse_widget(&args.widget)?;
    let profile = args.profile.as_deref().map(load_profile).transpose()?;
    tracing::debug!(%widget, custom_profile = profile.is_some(), "opening session");
    WidgetSession::open(widget, profile)
}

fn replay(session: &mut WidgetSession, script: &Path) -> Result<Value> {
    let commands = load_script(script)?;
    let run = session.run_script(commands);
    if let Some(failure) = run.failure.as_ref() {
        tracing::warn!(
            index = failure.index,
            op = failure.op,
            code = failure.code,
            "script stopped early"
        );
    }
    Ok(serde_json::to_value(&run)?)
}

fn run_widgets() -> Result<()> {
    let widgets = Widget::ALL
        .iter()
        .map(|widget| {
            let profile = widget.profile();
            serde_json::json!({
                "name": widget.as_str(),
                "description": widget.description(),
                "scores": profile.scores.iter().map(|rule| rule.name.as_str()).collect::<Vec<_>>(),
                "seed_records": widget.seed().len()
            })
        })
        .collect::<Vec<_>>();
    emit_json(serde_json::json!({ "widgets": widgets }))
}

fn run_show(args: &ShowArgs) -> Result<()> {
    let session = open_session(&args.widget)?;
    emit_json(serde_json::json!({
        "command": "show",
        "report": session.report()
    }))
}

fn run_script(args: &RunArgs) -> Result<()> {
    let mut session = open_session(&args.widget)?;
    let script = replay(&mut session, &args.script)?;
    let failed = script.get("failure").is_some();
    emit_json(serde_json::json!({
        "command": "run",
        "script": script,
        "report": session.report()
    }))?;
    if failed {
        return Err(anyhow!("script {} stopped at a rejected command", args.script.display()));
    }
    Ok(())
}

fn run_export(args: &ExportArgs) -> Result<()> {
    let mut session = open_session(&args.widget)?;
    if let Some(script) = args.script.as_deref() {
        let run = replay(&mut session, script)?;
        if let Some(failure) = run.get("failure") {
            return Err(anyhow!(
                "export aborted: script {} stopped at a rejected command: {failure}",
                script.display()
            ));
        }
    }
    print!("{}", session.export_csv());
    Ok(())
}
