pub mod commands;
mod config;
mod db;
mod errors;
pub mod places;
pub mod places_api;
pub mod reviews;
pub mod saved_places;
pub mod search;
pub mod terms;

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rusqlite::Connection as SqlConnection;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::StatusReport;

pub use config::{AppConfig, PublicAppConfig, DEFAULT_PLACES_ENDPOINT};
pub use db::{bootstrap, open_connection, with_immediate_tx, DatabaseContext};
pub use errors::{AppError, AppResult, FetchError};
pub use places::{upsert_place, Place, PlaceListing};
pub use places_api::{
    HttpPlacesClient, NearbySearch, PlacesService, RawResult, Rating, SearchArea, NO_BUSINESS,
    NO_LOCATION, NO_RATING,
};
pub use search::{PlaceSearchService, SearchOutcome, SearchQuery};
pub use terms::{get_or_create_term, SearchTerm};

pub struct AppState {
    db: Arc<Mutex<SqlConnection>>,
    db_path: PathBuf,
    config: AppConfig,
    search: Option<PlaceSearchService>,
}

impl AppState {
    /// Opens storage under `config.data_dir`. The search service is only
    /// available when a places API key is configured.
    pub fn initialize(config: AppConfig) -> AppResult<Self> {
        init_tracing();
        let DatabaseContext { connection, path } =
            bootstrap(&config.data_dir, &config.database_file_name)?;
        let db = Arc::new(Mutex::new(connection));

        let search = if config.places_api_key.is_some() {
            Some(PlaceSearchService::new(
                Arc::clone(&db),
                PlacesService::new(&config)?,
                config.search_area(),
                config.result_limit,
            ))
        } else {
            info!("PLACES_API_KEY not set; search is disabled");
            None
        };

        Ok(Self {
            db,
            db_path: path,
            config,
            search,
        })
    }

    /// Builds state around an explicit lookup backend.
    pub fn with_lookup(config: AppConfig, lookup: PlacesService) -> AppResult<Self> {
        init_tracing();
        let DatabaseContext { connection, path } =
            bootstrap(&config.data_dir, &config.database_file_name)?;
        let db = Arc::new(Mutex::new(connection));
        let search = PlaceSearchService::new(
            Arc::clone(&db),
            lookup,
            config.search_area(),
            config.result_limit,
        );
        Ok(Self {
            db,
            db_path: path,
            config,
            search: Some(search),
        })
    }

    pub fn search(&self) -> AppResult<&PlaceSearchService> {
        self.search
            .as_ref()
            .ok_or_else(|| AppError::Config("PLACES_API_KEY is not set".into()))
    }

    pub fn connection(&self) -> &Arc<Mutex<SqlConnection>> {
        &self.db
    }

    pub fn status(&self) -> AppResult<StatusReport> {
        let conn = self.db.lock();
        Ok(StatusReport {
            db_path: self.db_path.to_string_lossy().to_string(),
            term_count: terms::list_terms(&conn)?.len(),
            place_count: places::count_places(&conn)?,
            config: self.config.public_profile(),
        })
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,places_search=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
