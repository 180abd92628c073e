mod config;
mod config_cmd;
mod guide;
mod init;
mod profile;

use aidkit_core::RequestError;
use aidkit_core::guidance::GuidanceSession;
use aidkit_core::kit::default_kit;
use aidkit_core::oracle::{Oracle, create_oracle};
use aidkit_core::prep::{PrepRequest, PrepResponse, PrepService, resolve_family_count};
use aidkit_core::voice::{GuidanceMode, VoiceReply, VoiceRequest, VoiceService};
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigPaths, OracleConfig};
use profile::FamilyProfile;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "aidkit",
    version,
    about = "household first-aid prep and step-by-step emergency guidance"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    oracle: OracleArgs,
}

#[derive(Subcommand)]
enum Command {
    Init(init::InitArgs),
    Config(config_cmd::ConfigArgs),
    /// Suggest supplies beyond the default first-aid kit
    Prep(PrepArgs),
    /// Ask one emergency question
    Ask(AskArgs),
    /// Interactive guidance session
    Guide(GuideArgs),
}

#[derive(Args, Debug, Clone)]
struct OracleArgs {
    /// Oracle profile: local or cloud
    #[arg(long, global = true)]
    oracle: Option<String>,

    /// Model override for the selected profile
    #[arg(long, global = true, value_name = "model")]
    model: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct PrepArgs {
    /// Household description; replaces the profile when given
    #[arg(long)]
    context: Option<String>,

    /// Extra notes appended to the profile context
    #[arg(long)]
    notes: Option<String>,

    /// Household size used to scale the default kit
    #[arg(long)]
    family_count: Option<f64>,

    /// Family profile (default: ~/.aidkit/profile.toml)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Print the JSON response
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct AskArgs {
    /// What is happening
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,

    /// Answer as short steps
    #[arg(long)]
    steps: bool,

    /// Do not offer step-by-step guidance
    #[arg(long)]
    no_ask_steps: bool,

    /// Print the JSON response
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct GuideArgs {
    /// Initial mode: conversation or steps
    #[arg(long)]
    mode: Option<String>,

    /// Do not offer step-by-step guidance in conversation mode
    #[arg(long)]
    no_ask_steps: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn apply_env_overrides(oracle: &mut OracleConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup("AIDKIT_ORACLE_LOCAL_MODEL") {
        oracle.local.model = value;
    }
    if let Some(value) = lookup("AIDKIT_ORACLE_CLOUD_MODEL") {
        oracle.cloud.model = value;
    }
    if let Some(value) = lookup("AIDKIT_ORACLE_CLOUD_API_KEY") {
        oracle.cloud.api_key = value;
    }
    if oracle.cloud.api_key.trim().is_empty() {
        if let Some(value) = lookup("OPENAI_API_KEY") {
            oracle.cloud.api_key = value;
        }
    }
}

fn select_mode(active: &str, selector: Option<&str>) -> Result<String, String> {
    match selector {
        None => Ok(if active == "local" {
            "local".to_string()
        } else {
            "cloud".to_string()
        }),
        Some("local") => Ok("local".to_string()),
        Some("cloud") => Ok("cloud".to_string()),
        Some(other) => Err(format!("oracle must be local or cloud (got {other})")),
    }
}

fn non_empty_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Oracle for the selected profile; `None` when the hosted one has no key.
fn build_oracle(
    oracle: &OracleConfig,
    args: &OracleArgs,
) -> Result<Option<Box<dyn Oracle>>, String> {
    let mode = select_mode(oracle.active.as_str(), args.oracle.as_deref())?;
    let profile = oracle.profile_for_mode(mode.as_str());
    let model = args
        .model
        .as_deref()
        .and_then(non_empty_str)
        .or_else(|| non_empty_str(profile.model.as_str()));

    if profile.provider == "openai" && non_empty_str(profile.api_key.as_str()).is_none() {
        warn!("OPENAI_API_KEY is not configured; running without an oracle");
        return Ok(None);
    }

    let oracle = create_oracle(
        profile.provider.as_str(),
        model,
        non_empty_str(profile.api_key.as_str()),
        non_empty_str(profile.base_url.as_str()),
    )
    .map_err(|err| err.to_string())?;
    info!(mode, provider = oracle.name(), "oracle ready");
    Ok(Some(oracle))
}

fn resolve_oracle(config: &Config, args: &OracleArgs) -> Result<Option<Box<dyn Oracle>>, String> {
    let mut oracle = config.oracle.clone();
    apply_env_overrides(&mut oracle, env_override);
    build_oracle(&oracle, args)
}

fn format_timestamp(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

fn exit_with(label: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{label}: {err}");
    std::process::exit(1);
}

fn request_failed(err: RequestError) -> ! {
    eprintln!("request failed ({}): {err}", err.status());
    std::process::exit(1);
}

/// Context and household size for `prep`, from flags or the saved profile.
fn prep_request(
    args: &PrepArgs,
    config: &Config,
    paths: &ConfigPaths,
) -> Result<PrepRequest, String> {
    if let Some(context) = args.context.as_deref().and_then(non_empty_str) {
        let mut context = context.to_string();
        if let Some(notes) = args.notes.as_deref().and_then(non_empty_str) {
            context = format!("{context} | {notes}");
        }
        return Ok(PrepRequest {
            context,
            family_count: args
                .family_count
                .or(Some(f64::from(config.prep.default_family_count))),
        });
    }

    let path = args
        .profile
        .clone()
        .unwrap_or_else(|| config.profile_path(paths));
    let profile = FamilyProfile::load(&path).map_err(|err| err.to_string())?;
    let notes = args.notes.as_deref().unwrap_or_default();
    let profile = match profile {
        Some(profile) => profile,
        None if !notes.trim().is_empty() => FamilyProfile::default(),
        None => {
            return Err(format!(
                "no household context: pass --context or fill in {} (aidkit init)",
                path.display()
            ));
        }
    };

    let family_count = match args.family_count {
        Some(count) => resolve_family_count(Some(count)),
        None => profile.family_count(config.prep.default_family_count),
    };
    Ok(PrepRequest {
        context: profile.context(family_count, notes),
        family_count: Some(f64::from(family_count)),
    })
}

fn print_prep(response: &PrepResponse, family_count: u32) {
    println!("Default kit (household of {family_count}):");
    for item in default_kit(family_count) {
        println!("  - {item}");
    }
    println!();

    let result = &response.result;
    for section in &result.sections {
        println!("{}:", section.title);
        for item in &section.items {
            println!("  - {}", item.name);
            println!("    Reason: {}", item.reason);
            println!("    Caution: {}", item.caution);
        }
    }
    println!();
    println!("{}", result.reason);
    println!("generated {} ({})", format_timestamp(result.created_at), result.id);
    if response.fallback {
        match &response.error {
            Some(err) => println!("offline suggestions used: {err}"),
            None => println!("offline suggestions used"),
        }
    }
}

fn print_voice(reply: &VoiceReply) {
    match &reply.assistant_steps {
        Some(steps) => {
            for (index, step) in steps.iter().enumerate() {
                println!("{}. {step}", index + 1);
            }
        }
        None => println!("{}", reply.assistant_text),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => exit_with("json encode failed", err),
    }
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let paths = match ConfigPaths::from_home() {
        Ok(paths) => paths,
        Err(err) => exit_with("config paths error", err),
    };

    let command = match cli.command {
        Command::Init(args) => {
            if let Err(e) = init::run(&args, &paths) {
                exit_with("init failed", e);
            }
            return;
        }
        Command::Config(args) => {
            if let Err(e) = config_cmd::run(&args, &paths) {
                exit_with("config failed", e);
            }
            return;
        }
        command => command,
    };

    let config = match Config::load_or_create(&paths) {
        Ok(config) => config,
        Err(err) => exit_with("config load failed", err),
    };
    if let Err(err) = config.validate() {
        exit_with("config invalid", err);
    }
    let oracle = match resolve_oracle(&config, &cli.oracle) {
        Ok(oracle) => oracle,
        Err(err) => exit_with("oracle init failed", err),
    };

    match command {
        Command::Prep(args) => {
            let request = match prep_request(&args, &config, &paths) {
                Ok(request) => request,
                Err(err) => exit_with("prep failed", err),
            };
            let service = PrepService::new(oracle);
            let response = match service.submit(&request) {
                Ok(response) => response,
                Err(err) => request_failed(err),
            };
            if args.json {
                print_json(&response);
            } else {
                print_prep(&response, resolve_family_count(request.family_count));
            }
        }
        Command::Ask(args) => {
            let text = args.text.join(" ");
            let request = if args.steps {
                VoiceRequest::steps(text)
            } else {
                VoiceRequest::conversation(text, !args.no_ask_steps)
            };
            let service = VoiceService::new(oracle);
            let reply = match service.submit(&request) {
                Ok(reply) => reply,
                Err(err) => request_failed(err),
            };
            if args.json {
                print_json(&reply);
            } else {
                print_voice(&reply);
            }
        }
        Command::Guide(args) => {
            let mode = match args.mode.as_deref() {
                Some(value) => match GuidanceMode::parse(value) {
                    Some(mode) => mode,
                    None => exit_with("guide failed", format!("mode must be conversation or steps (got {value})")),
                },
                None => config.initial_mode(),
            };
            let ask_steps = config.guide.ask_steps && !args.no_ask_steps;
            let voice = VoiceService::new(oracle).with_history_limit(config.guide.history_limit);
            if !voice.has_oracle() {
                eprintln!("no oracle configured; run `aidkit init --api-key ...` or use --oracle local");
            }
            let mut session = GuidanceSession::new(mode, ask_steps);
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            if let Err(err) = guide::run(stdin.lock(), &mut stdout, &mut session, &voice) {
                exit_with("guide failed", err);
            }
        }
        Command::Init(_) | Command::Config(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{
        OracleArgs, PrepArgs, apply_env_overrides, build_oracle, format_timestamp, prep_request,
        select_mode,
    };
    use crate::config::{Config, ConfigPaths, OracleConfig};
    use std::fs;

    fn no_flags() -> OracleArgs {
        OracleArgs {
            oracle: None,
            model: None,
        }
    }

    fn prep_args() -> PrepArgs {
        PrepArgs {
            context: None,
            notes: None,
            family_count: None,
            profile: None,
            json: false,
        }
    }

    #[test]
    fn select_mode_prefers_flag() {
        assert_eq!(select_mode("cloud", None).unwrap(), "cloud");
        assert_eq!(select_mode("local", None).unwrap(), "local");
        assert_eq!(select_mode("cloud", Some("local")).unwrap(), "local");
        assert!(select_mode("cloud", Some("edge")).is_err());
    }

    #[test]
    fn env_overrides_fill_missing_cloud_key() {
        let mut oracle = OracleConfig::default();
        apply_env_overrides(&mut oracle, |key| match key {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "AIDKIT_ORACLE_LOCAL_MODEL" => Some("qwen3:8b".to_string()),
            _ => None,
        });
        assert_eq!(oracle.cloud.api_key, "sk-env");
        assert_eq!(oracle.local.model, "qwen3:8b");

        let mut oracle = OracleConfig::default();
        oracle.cloud.api_key = "sk-config".to_string();
        apply_env_overrides(&mut oracle, |key| match key {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            _ => None,
        });
        assert_eq!(oracle.cloud.api_key, "sk-config");

        apply_env_overrides(&mut oracle, |key| {
            (key == "AIDKIT_ORACLE_CLOUD_API_KEY").then(|| "sk-aidkit".to_string())
        });
        assert_eq!(oracle.cloud.api_key, "sk-aidkit");
    }

    #[test]
    fn cloud_without_key_runs_without_oracle() {
        let oracle = OracleConfig::default();
        assert!(build_oracle(&oracle, &no_flags()).unwrap().is_none());
    }

    #[test]
    fn local_profile_builds_oracle() {
        let oracle = OracleConfig::default();
        let args = OracleArgs {
            oracle: Some("local".to_string()),
            model: Some("llama3.2".to_string()),
        };
        let built = build_oracle(&oracle, &args).unwrap().unwrap();
        assert_eq!(built.name(), "ollama");
    }

    #[test]
    fn prep_request_from_flags() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_base(temp.path().to_path_buf());
        let mut args = prep_args();
        args.context = Some("two adults, one infant".to_string());
        args.notes = Some("live far from a pharmacy".to_string());
        let request = prep_request(&args, &Config::default(), &paths).unwrap();
        assert_eq!(request.context, "two adults, one infant | live far from a pharmacy");
        assert_eq!(request.family_count, Some(1.0));
    }

    #[test]
    fn prep_request_from_profile() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_base(temp.path().to_path_buf());
        fs::write(
            &paths.profile_path,
            "[[members]]\nname = \"Sam\"\nage = 70\n\n[[members]]\nname = \"Lee\"\nage = 68\n",
        )
        .unwrap();
        let request = prep_request(&prep_args(), &Config::default(), &paths).unwrap();
        assert_eq!(request.family_count, Some(2.0));
        assert!(request.context.starts_with("Family size: 2 | User: Sam"));

        let mut args = prep_args();
        args.family_count = Some(4.2);
        let request = prep_request(&args, &Config::default(), &paths).unwrap();
        assert_eq!(request.family_count, Some(5.0));
    }

    #[test]
    fn prep_request_without_context_fails() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_base(temp.path().to_path_buf());
        let err = prep_request(&prep_args(), &Config::default(), &paths).unwrap_err();
        assert!(err.contains("no household context"));
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        let stamp = format_timestamp(1_700_000_000_123);
        assert!(stamp.starts_with("2023-11-14T22:13:20.123"));
        assert!(stamp.ends_with('Z'));
    }
}
