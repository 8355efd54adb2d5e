use std::path::Path;

use anyhow::Result;
use gcs_core::env::FppEnv;
use gcs_core::gcs_config::GcsConfig;
use owo_colors::OwoColorize;

pub fn run(path: Option<&Path>) -> Result<()> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => GcsConfig::config_path()?,
    };
    let config = match path {
        Some(path) => GcsConfig::load_from(path)?,
        None => GcsConfig::load()?,
    };
    let env = FppEnv::load(&config.env_path())?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());
    println!("  Manifest:   {}", config.manifest_path().display());
    println!("  Host env:   {}", config.env_path().display());

    println!("\n{}", "Environment".bold());
    match &env {
        Some(env) => {
            println!("  Timezone:   {}", env.timezone.as_deref().unwrap_or("(none)"));
            let location = if env.has_location() { "set" } else { "missing" };
            println!("  Location:   {location}");
        }
        None => println!("  {}", "(no export found)".dimmed()),
    }
    println!("  Effective:  {}", config.resolve_timezone(env.as_ref())?);

    println!("\n{}", "Settings".bold());
    print!("{}", config.to_toml()?);
    Ok(())
}
