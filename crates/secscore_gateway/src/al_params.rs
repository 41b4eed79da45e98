//! The per-category Asymmetric Laplace parameter table, loaded once from a
//! bundled JSON file at startup.

use std::collections::HashMap;

use secscore_engine::ModelParams;

const BUNDLED_AL_PARAMS: &str = include_str!("../data/al_params.json");

/// Loads the bundled AL parameter table. Panics at startup (not per-request)
/// if the bundled file is malformed or missing the mandatory `"default"`
/// key — this is a build-time asset, not upstream input.
pub fn load_al_params() -> HashMap<String, ModelParams> {
    let table: HashMap<String, ModelParams> =
        serde_json::from_str(BUNDLED_AL_PARAMS).expect("bundled al_params.json must parse");
    assert!(
        table.contains_key("default"),
        "bundled al_params.json must define a \"default\" category"
    );
    table
}

/// Looks up `category`'s parameters, falling back to `"default"`.
pub fn params_for<'a>(table: &'a HashMap<String, ModelParams>, category: &str) -> &'a ModelParams {
    table
        .get(category)
        .unwrap_or_else(|| table.get("default").expect("default category is guaranteed present"))
}
