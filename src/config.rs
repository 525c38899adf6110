use std::path::PathBuf;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::places_api::SearchArea;

pub const DEFAULT_PLACES_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const DEFAULT_CENTER_LAT: f64 = 42.2808;
const DEFAULT_CENTER_LNG: f64 = -83.7430;
const DEFAULT_RADIUS_M: u32 = 500;
const DEFAULT_RESULT_LIMIT: usize = 3;
const MAX_RESULT_LIMIT: usize = 20;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub places_api_key: Option<SecretString>,
    pub places_endpoint: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: u32,
    pub category: String,
    pub result_limit: usize,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub database_file_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub places_endpoint: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: u32,
    pub category: String,
    pub result_limit: usize,
    pub request_timeout_secs: u64,
    pub data_dir: String,
    pub database_file_name: String,
    pub has_places_api_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            places_api_key: env::var("PLACES_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            places_endpoint: env::var("PLACES_API_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PLACES_ENDPOINT.to_string()),
            center_lat: parse_f64("PLACES_CENTER_LAT", DEFAULT_CENTER_LAT),
            center_lng: parse_f64("PLACES_CENTER_LNG", DEFAULT_CENTER_LNG),
            radius_m: parse_u32("PLACES_RADIUS_M", DEFAULT_RADIUS_M).max(1),
            category: env::var("PLACES_CATEGORY").unwrap_or_else(|_| "food".to_string()),
            result_limit: parse_usize("PLACES_RESULT_LIMIT", DEFAULT_RESULT_LIMIT)
                .clamp(1, MAX_RESULT_LIMIT),
            request_timeout_secs: parse_u64("PLACES_TIMEOUT_SECS", 10).max(1),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            database_file_name: env::var("DATABASE_FILE_NAME")
                .unwrap_or_else(|_| "places-search.db".to_string()),
        }
    }

    pub fn search_area(&self) -> SearchArea {
        SearchArea {
            latitude: self.center_lat,
            longitude: self.center_lng,
            radius_m: self.radius_m,
            category: self.category.clone(),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            places_endpoint: self.places_endpoint.clone(),
            center_lat: self.center_lat,
            center_lng: self.center_lng,
            radius_m: self.radius_m,
            category: self.category.clone(),
            result_limit: self.result_limit,
            request_timeout_secs: self.request_timeout_secs,
            data_dir: self.data_dir.to_string_lossy().to_string(),
            database_file_name: self.database_file_name.clone(),
            has_places_api_key: self.places_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
