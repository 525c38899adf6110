use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::PublicAppConfig;
use crate::errors::AppResult;
use crate::reviews::{self, NewReview};
use crate::search::SearchQuery;
use crate::{places, saved_places, terms, AppState};

#[derive(Debug, Parser)]
#[command(name = "places-search")]
#[command(about = "Search nearby places and keep a deduplicated local record", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query the places API and record the top results.
    Search { query: Vec<String> },
    /// Every place discovered so far, with its owning term.
    Places,
    /// Every recorded search term.
    Terms,
    /// Places first discovered under one term.
    Term { text: String },
    #[command(subcommand)]
    Review(ReviewCommand),
    #[command(subcommand)]
    Saved(SavedCommand),
    /// Storage location, counts and non-secret configuration.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum ReviewCommand {
    Add {
        place_name: String,
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long)]
        price: u8,
        #[arg(short, long)]
        comments: Option<String>,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum SavedCommand {
    Add { name: String },
    List,
    Rename { current: String, new_name: String },
    Remove { name: String },
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub term_count: usize,
    pub place_count: usize,
    pub config: PublicAppConfig,
}

/// Runs one command and returns its JSON rendering.
pub async fn execute(state: &AppState, command: Command) -> AppResult<Value> {
    match command {
        Command::Search { query } => {
            let outcome = state.search()?.search(&query.join(" ")).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Places => to_json(places::list_places(&state.connection().lock())?),
        Command::Terms => to_json(terms::list_terms(&state.connection().lock())?),
        Command::Term { text } => {
            let query = SearchQuery::parse(&text)?;
            let found = terms::places_for_term(&state.connection().lock(), query.as_str())?;
            Ok(json!({ "term": query.as_str(), "places": found }))
        }
        Command::Review(ReviewCommand::Add {
            place_name,
            rating,
            price,
            comments,
        }) => {
            let review = NewReview {
                place_name,
                rating,
                price,
                comments,
            };
            to_json(reviews::add_review(&state.connection().lock(), review)?)
        }
        Command::Review(ReviewCommand::List) => {
            to_json(reviews::list_reviews(&state.connection().lock())?)
        }
        Command::Saved(command) => saved(state, command),
        Command::Status => to_json(state.status()?),
    }
}

fn saved(state: &AppState, command: SavedCommand) -> AppResult<Value> {
    let conn = state.connection().lock();
    match command {
        SavedCommand::Add { name } => {
            to_json(saved_places::get_or_create_saved_place(&conn, &name)?)
        }
        SavedCommand::List => to_json(saved_places::list_saved_places(&conn)?),
        SavedCommand::Rename { current, new_name } => to_json(
            saved_places::rename_saved_place(&conn, current.trim(), &new_name)?,
        ),
        SavedCommand::Remove { name } => {
            saved_places::delete_saved_place(&conn, name.trim())?;
            Ok(json!({ "deleted": name.trim() }))
        }
    }
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}
