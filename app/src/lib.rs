#![allow(dead_code)]

pub mod config;
pub mod logging;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;

use drill_algo::{SamplerConfig, Word};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Minimal built-in word catalog for the tone family. The teacher's word
/// tables live in Postgres; spec scopes persistence out, so this in-memory
/// list stands in for it (same surface forms used throughout the core
/// crate's own tests).
fn seed_catalog() -> Vec<Word> {
    vec![
        Word { id: 1, surface_form: "ma".into(), gloss: "ghost".into(), image_url: None },
        Word { id: 2, surface_form: "má".into(), gloss: "mother".into(), image_url: None },
        Word { id: 3, surface_form: "mả".into(), gloss: "tomb".into(), image_url: None },
        Word { id: 4, surface_form: "mã".into(), gloss: "code".into(), image_url: None },
        Word { id: 5, surface_form: "mạ".into(), gloss: "rice seedling".into(), image_url: None },
        Word { id: 6, surface_form: "mà".into(), gloss: "that".into(), image_url: None },
        Word { id: 7, surface_form: "ba".into(), gloss: "three".into(), image_url: None },
        Word { id: 8, surface_form: "bà".into(), gloss: "grandmother".into(), image_url: None },
        Word { id: 9, surface_form: "ma mà".into(), gloss: "ghost that".into(), image_url: None },
        Word { id: 10, surface_form: "ba bà".into(), gloss: "three grandmothers".into(), image_url: None },
    ]
}

pub fn create_app() -> axum::Router {
    let state = AppState::new(SamplerConfig::from_env(), seed_catalog());

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
