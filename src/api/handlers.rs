use crate::api::AppState;
use crate::error::Result;
use crate::ml::{
    FeatureImportance, PredictionInput, PredictionOutput, TemperatureCurvePoint, TrainOutcome,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Temperature sweep served by `/temperature-curve`
const CURVE_POINTS: usize = 20;
const CURVE_RANGE: (f64, f64) = (60.0, 110.0);

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.registry.is_loaded().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

/// Predict defect probability for one production record
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionInput>,
) -> Result<Json<PredictionOutput>> {
    request.validate()?;
    let output = state.registry.predict(&request).await?;
    Ok(Json(output))
}

/// Predict for a batch of records; any invalid record fails the whole batch
pub async fn predict_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<PredictionInput>>,
) -> Result<Json<Vec<PredictionOutput>>> {
    for request in &requests {
        request.validate()?;
    }
    let outputs = state.registry.predict_batch(&requests).await?;
    Ok(Json(outputs))
}

/// Per-feature importance of the served model
pub async fn feature_importance(
    State(state): State<AppState>,
) -> Json<Vec<FeatureImportance>> {
    Json(state.registry.feature_importance().await)
}

/// Defect probability swept over a fixed temperature grid
pub async fn temperature_curve(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemperatureCurvePoint>>> {
    let curve = state
        .registry
        .temperature_curve(CURVE_POINTS, CURVE_RANGE)
        .await?;
    Ok(Json(curve))
}

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    pub data_path: Option<PathBuf>,
}

/// Retrain from a CSV and swap the served model on success
pub async fn train(
    State(state): State<AppState>,
    Query(query): Query<TrainQuery>,
) -> Result<Json<TrainOutcome>> {
    let data_path = query
        .data_path
        .unwrap_or_else(|| state.config.model.default_data_path.clone());
    let outcome = state.registry.train(&data_path).await?;
    Ok(Json(outcome))
}
