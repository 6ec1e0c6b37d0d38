// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Init command - write a default .tagflow.yaml

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::params::{CONFIG_FILE, DEFAULT_IMAGE_NAME, DEFAULT_REGISTRY_HOST};

/// Run the init command
pub async fn run(force: bool, verbose: bool) -> Result<()> {
    println!("{}", "Initializing tagflow...".bold());
    println!();

    let path = Path::new(CONFIG_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            CONFIG_FILE
        ));
    }

    let content = generate_config();
    std::fs::write(path, &content)
        .map_err(|e| miette::miette!("Failed to write {}: {}", CONFIG_FILE, e))?;

    println!("  {} Created {}", "✓".green(), CONFIG_FILE);

    if !Path::new("Dockerfile").exists() {
        println!(
            "  {} No Dockerfile here; set {} if it lives elsewhere",
            "⚠".yellow(),
            "dockerfile".cyan()
        );
    }

    println!();
    println!("{}", "Ready!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to point at your registry", CONFIG_FILE.cyan());
    println!("  2. Run {} to check the setup", "tagflow validate".cyan());
    println!("  3. Run {} to build and publish", "tagflow run".cyan());
    println!();

    if verbose {
        println!("{}", "Generated config:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}

fn generate_config() -> String {
    format!(
        r#"# tagflow configuration
#
# Every value can also be set with an environment variable or a flag on
# 'tagflow run'; flags win over the environment, which wins over this file.

# Registry host[:port]                               (REGISTRY_HOST)
registry_host: "{DEFAULT_REGISTRY_HOST}"

# Repository path of the image in the registry       (IMAGE_NAME)
image_name: "{DEFAULT_IMAGE_NAME}"

# Dockerfile and build context, relative to here     (DOCKERFILE, BUILD_CONTEXT)
dockerfile: "Dockerfile"
build_context: "."

# Log in before pushing                              (REGISTRY_AUTH)
registry_auth: false

# Credential reference for the login. Resolved from the credentials file,
# then from <REF>_USR / <REF>_PSW in the environment. (REGISTRY_CREDENTIALS_ID)
registry_credentials_id: ""

# credentials_file: "credentials.yaml"

# Source to fetch before building; omit to build the directory as-is
# checkout:
#   repository: "https://example.com/app.git"     (SOURCE_REPOSITORY)
#   revision: "main"                               (SOURCE_REVISION)

tools:
  engine: "docker"                                 # (CONTAINER_ENGINE)
  git: "git"
  curl: "curl"

history:
  enabled: true
  directory: ".tagflow/history"
  keep: 20
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let params = Parameters::from_yaml(&generate_config()).unwrap();
        assert_eq!(params, Parameters::default());
    }
}
