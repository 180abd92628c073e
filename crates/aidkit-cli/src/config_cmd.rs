use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::process::Command;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Print config with secrets redacted
    #[arg(long)]
    pub print: bool,

    /// Edit config in $EDITOR
    #[arg(long)]
    pub edit: bool,

    /// Set a config value (dotted key=value)
    #[arg(long, value_name = "key=value")]
    pub set: Vec<String>,
}

pub fn run(args: &ConfigArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    if args.edit && (!args.set.is_empty() || args.print) {
        return Err(ConfigError::Validation(
            "--edit cannot be combined with --set or --print".into(),
        ));
    }

    let mut config = Config::load_or_create(paths)?;

    if args.edit {
        edit_config(paths)?;
        config = Config::load(paths)?;
        config.validate()?;
        return Ok(());
    }

    if !args.set.is_empty() {
        for assignment in &args.set {
            apply_set(&mut config, assignment)?;
        }
        config.validate()?;
        Config::write(paths, &config)?;
    }

    if args.print || args.set.is_empty() {
        let redacted = config.redacted();
        let output = toml::to_string_pretty(&redacted)?;
        println!("{output}");
    }

    Ok(())
}

fn edit_config(paths: &ConfigPaths) -> Result<(), ConfigError> {
    let editor = std::env::var("EDITOR")
        .map_err(|_| ConfigError::Validation("$EDITOR not set; use --set or set EDITOR".into()))?;
    let parts = split_editor_command(&editor)?;
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| ConfigError::Validation("$EDITOR is empty".into()))?;
    let status = Command::new(program)
        .args(args)
        .arg(&paths.config_path)
        .status()
        .map_err(ConfigError::Io)?;
    if !status.success() {
        return Err(ConfigError::Validation(
            "editor exited with a non-zero status".into(),
        ));
    }
    Ok(())
}

fn split_editor_command(editor: &str) -> Result<Vec<String>, ConfigError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = editor.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
            }
            '"' if !in_single => {
                in_double = !in_double;
            }
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ch if ch.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if in_single || in_double {
        return Err(ConfigError::Validation(
            "$EDITOR has unmatched quotes".into(),
        ));
    }
    if !current.is_empty() {
        parts.push(current);
    }

    if parts.is_empty() {
        return Err(ConfigError::Validation("$EDITOR is empty".into()));
    }

    Ok(parts)
}

fn apply_set(config: &mut Config, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Validation("expected key=value for --set".into()))?;
    let key = key.trim();
    let value = value.trim();
    match key {
        "oracle.active" => {
            config.oracle.active = value.to_string();
        }
        "oracle.local.provider" => config.oracle.local.provider = value.to_string(),
        "oracle.local.model" => config.oracle.local.model = value.to_string(),
        "oracle.local.api_key" => config.oracle.local.api_key = value.to_string(),
        "oracle.local.base_url" => config.oracle.local.base_url = value.to_string(),
        "oracle.cloud.provider" => config.oracle.cloud.provider = value.to_string(),
        "oracle.cloud.model" => config.oracle.cloud.model = value.to_string(),
        "oracle.cloud.api_key" => config.oracle.cloud.api_key = value.to_string(),
        "oracle.cloud.base_url" => config.oracle.cloud.base_url = value.to_string(),
        "oracle.provider" | "oracle.model" | "oracle.api_key" | "oracle.base_url" => {
            if !matches!(config.oracle.active.as_str(), "local" | "cloud") {
                return Err(ConfigError::Validation(format!(
                    "{key} cannot be set because active profile is invalid"
                )));
            }
            let profile = config.oracle.active_profile_mut();
            let field = match key {
                "oracle.provider" => &mut profile.provider,
                "oracle.model" => &mut profile.model,
                "oracle.api_key" => &mut profile.api_key,
                _ => &mut profile.base_url,
            };
            *field = value.to_string();
        }
        "prep.default_family_count" => {
            let parsed = parse_u32(value, key)?;
            if parsed == 0 {
                return Err(ConfigError::Validation(
                    "prep.default_family_count must be greater than 0".into(),
                ));
            }
            config.prep.default_family_count = parsed;
        }
        "prep.profile_path" => {
            config.prep.profile_path = value.to_string();
        }
        "guide.history_limit" => {
            config.guide.history_limit = parse_u32(value, key)? as usize;
        }
        "guide.initial_mode" => {
            config.guide.initial_mode = value.to_string();
        }
        "guide.ask_steps" => {
            config.guide.ask_steps = parse_bool(value, key)?;
        }
        _ => {
            return Err(ConfigError::Validation(format!(
                "unknown config key: {key}"
            )));
        }
    }
    Ok(())
}

fn parse_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{key} expects true or false"
        ))),
    }
}

fn parse_u32(value: &str, key: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects an unsigned integer")))
}
