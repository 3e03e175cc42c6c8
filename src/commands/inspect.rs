// src/commands/inspect.rs

//! Recipe inspection commands: validate and info

use super::load_recipe;
use anyhow::{Context, Result};
use pantry::recipe::{validate_recipe, Action};

/// Validate a recipe and print its warnings
pub fn cmd_validate(recipe_path: &str) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let warnings = validate_recipe(&recipe);

    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    println!("Recipe validation passed: {}", recipe.name);
    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }

    Ok(())
}

/// Show what a recipe declares
pub fn cmd_info(recipe_path: &str, json: bool) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;

    if json {
        let output = serde_json::to_string_pretty(&recipe)
            .context("Failed to serialize recipe")?;
        println!("{}", output);
        return Ok(());
    }

    println!("{} {}", recipe.name, recipe.version.as_deref().unwrap_or("HEAD"));
    println!("  {}", recipe.desc);
    println!("  Homepage: {}", recipe.homepage);
    println!("  License:  {}", recipe.license);

    if let Some(url) = &recipe.url {
        println!("  Source:   {}", url);
        if recipe.sha256.is_verified() {
            println!("  Checksum: {}", recipe.sha256);
        } else {
            println!("  Checksum: (none, source will not be verified)");
        }
    }
    if let Some(head) = &recipe.head {
        match &head.branch {
            Some(branch) => println!("  Head:     {} ({})", head.url, branch),
            None => println!("  Head:     {}", head.url),
        }
    }

    if !recipe.depends_on.is_empty() {
        println!("  Depends:  {}", recipe.depends_on.join(", "));
    }

    println!("\nInstall steps:");
    for (i, action) in recipe.install.iter().enumerate() {
        match action {
            Action::CopyArtifact { .. } => println!(
                "  {}. {} -> bin/{}",
                i + 1,
                action.label(),
                action.installed_name().unwrap_or_default()
            ),
            _ => println!("  {}. {}", i + 1, action.label()),
        }
    }

    if !recipe.test.is_empty() {
        println!("\nTests:");
        for action in &recipe.test {
            if let Action::AssertOutputContains { command, expected } = action {
                println!("  - {} (expects {:?})", command, expected);
            }
        }
    }

    Ok(())
}
