//! Menu-driven interface for running commands without memorizing flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::commands::{self, Context};

enum Action {
    Submit,
    Status,
    Download,
    Merge,
    Favorite,
    Unfavorite,
    Latest,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Submit,
        Self::Status,
        Self::Download,
        Self::Merge,
        Self::Favorite,
        Self::Unfavorite,
        Self::Latest,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Submit => "Submit a query file",
            Self::Status => "Check a query's status",
            Self::Download => "Download a query's results",
            Self::Merge => "Merge one query into another",
            Self::Favorite => "Mark a query as favorite",
            Self::Unfavorite => "Remove a favorite mark",
            Self::Latest => "List recent queries",
        }
    }
}

/// Prompts for an action and its arguments, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected command fails.
pub async fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    println!("PAIRS Query Client");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Submit => {
            let file: String = Input::new()
                .with_prompt("Query request file")
                .interact_text()?;
            let submit_only = !Confirm::new()
                .with_prompt("Wait for the results and download them?")
                .default(true)
                .interact()?;
            commands::submit(ctx, &PathBuf::from(file), None, None, submit_only).await?;
        }
        Action::Status => {
            let id = prompt_id("Query id")?;
            let poll = Confirm::new()
                .with_prompt("Wait until the query finishes?")
                .default(false)
                .interact()?;
            commands::status(ctx, &id, poll, None).await?;
        }
        Action::Download => {
            let id = prompt_id("Query id")?;
            let folder: String = Input::new()
                .with_prompt("Download folder")
                .default(ctx.config.download_dir.display().to_string())
                .interact_text()?;
            commands::download(ctx, &id, Some(PathBuf::from(folder)), None, None).await?;
        }
        Action::Merge => {
            let base = prompt_id("Base query id")?;
            let other = prompt_id("Query id to merge into it")?;
            commands::merge(ctx, &other, &base).await?;
        }
        Action::Favorite => commands::set_favorite(ctx, &prompt_id("Query id")?, true).await?,
        Action::Unfavorite => {
            commands::set_favorite(ctx, &prompt_id("Query id")?, false).await?;
        }
        Action::Latest => {
            let user: String = Input::new()
                .with_prompt("User")
                .with_initial_text(ctx.config.user.clone().unwrap_or_default())
                .interact_text()?;
            let count: u32 = Input::new()
                .with_prompt("How many?")
                .default(10)
                .interact_text()?;
            commands::latest(ctx, &user, count).await?;
        }
    }

    Ok(())
}

fn prompt_id(prompt: &str) -> Result<String, dialoguer::Error> {
    Input::new().with_prompt(prompt).interact_text()
}
