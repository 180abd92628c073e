use crate::config::{Config, ConfigPaths};
use crate::profile::PROFILE_TEMPLATE;
use clap::Args;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Write OPENAI_API_KEY to .env (defaults to OPENAI_API_KEY from current env)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Use the local ollama profile instead of the hosted one
    #[arg(long)]
    pub local: bool,

    /// .env file to update
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Overwrite an existing profile with the template
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, paths: &ConfigPaths) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_create(paths)?;
    if args.local {
        config.oracle.active = "local".to_string();
        config.validate()?;
        Config::write(paths, &config)?;
    }
    println!("config at {}", paths.config_path.display());

    let profile_path = config.profile_path(paths);
    if write_profile_template(&profile_path, args.force)? {
        println!("profile template written to {}", profile_path.display());
    } else {
        println!("profile already present at {}", profile_path.display());
    }

    let env_key = std::env::var("OPENAI_API_KEY").ok();
    let api_key = args
        .api_key
        .as_deref()
        .or(env_key.as_deref())
        .map(str::trim)
        .filter(|key| !key.is_empty());
    match api_key {
        Some(key) => {
            write_env_file(&args.env_file, "OPENAI_API_KEY", key)?;
            println!("OPENAI_API_KEY saved to {}", args.env_file.display());
        }
        None if !args.local => {
            println!("no OPENAI_API_KEY given; prep will use offline suggestions");
        }
        None => {}
    }
    Ok(())
}

fn write_profile_template(path: &Path, force: bool) -> Result<bool, io::Error> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, PROFILE_TEMPLATE)?;
    Ok(true)
}

fn write_env_file(path: &Path, key: &str, value: &str) -> Result<(), io::Error> {
    let mut lines = match fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(|l| l.to_string()).collect(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err),
    };

    upsert_env_var(&mut lines, key, value);

    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

fn upsert_env_var(lines: &mut Vec<String>, key: &str, value: &str) {
    let prefix = format!("{key}=");
    for line in lines.iter_mut() {
        if line.starts_with(&prefix) {
            *line = format!("{key}={value}");
            return;
        }
    }
    lines.push(format!("{key}={value}"));
}
