//! Offline unit tests for boothdb-db pool configuration and row types.
//! These tests do not require a live database connection.

use boothdb_core::{AppConfig, CatalogEntry, Environment, SourceConfig};
use boothdb_db::{BoothRow, PoolConfig, SourceRow};
use chrono::Utc;
use sqlx::types::Json;
use std::path::PathBuf;
use uuid::Uuid;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        sources_path: PathBuf::from("./config/sources.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        fetch_timeout_secs: 30,
        fetch_user_agent: "ua".to_string(),
        agent_url: None,
        agent_api_key: None,
        agent_timeout_secs: 120,
        geocode_user_agent: "ua".to_string(),
        nominatim_url: "https://nominatim.openstreetmap.org/".to_string(),
        mapbox_access_token: None,
        google_maps_api_key: None,
        geocode_timeout_secs: 10,
        geocode_max_retries: 2,
        geocode_backoff_base_ms: 1000,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn pool_min_connections_never_exceed_max() {
    let mut config = app_config();
    config.db_max_connections = 2;
    config.db_min_connections = 5;

    let pool_config = PoolConfig::from_app_config(&config);
    assert_eq!(pool_config.min_connections, 2);
}

#[test]
fn source_row_round_trips_into_the_domain() {
    let row = SourceRow {
        id: Uuid::new_v4(),
        name: "Reddit r/analog".to_string(),
        slug: "reddit-r-analog".to_string(),
        url: "https://reddit.com/r/analog".to_string(),
        source_type: "single_venue_blog".to_string(),
        extraction_mode: "agent".to_string(),
        pattern_learning_status: "failed".to_string(),
        pattern_learned_at: None,
        enabled: false,
        notes: Some("rate limited".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let id = row.id;

    let source = SourceConfig::try_from(row).unwrap();
    assert_eq!(source.id, id);
    assert!(!source.enabled);
}

#[test]
fn booth_row_unwraps_the_stored_record() {
    let record = boothdb_core::CandidateRecord {
        name: "Photoworks".to_string(),
        address: "2 Bedford Ave".to_string(),
        city: Some("Brooklyn".to_string()),
        ..boothdb_core::CandidateRecord::default()
    };
    let row = BoothRow {
        id: Uuid::new_v4(),
        booth_key: record.booth_key(),
        record: Json(record.clone()),
        first_seen_at: Utc::now(),
        last_seen_at: Utc::now(),
    };

    let entry = CatalogEntry::from(row);
    assert_eq!(entry.record, record);
}
