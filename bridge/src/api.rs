use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::warn;

use prowarm_common::{Characteristic, CharacteristicValue};

use crate::accessory::{CharacteristicError, ThermostatAccessory};

#[derive(Clone)]
pub struct AppState {
    pub accessories: Arc<Vec<Arc<ThermostatAccessory>>>,
}

impl AppState {
    pub fn new(accessories: Vec<Arc<ThermostatAccessory>>) -> Self {
        Self {
            accessories: Arc::new(accessories),
        }
    }

    fn find(&self, id: &str) -> Option<&Arc<ThermostatAccessory>> {
        self.accessories
            .iter()
            .find(|accessory| accessory.id() == id || accessory.uuid() == id)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct CharacteristicBody {
    characteristic: &'static str,
    value: CharacteristicValue,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/accessories", get(handle_list_accessories))
        .route("/api/accessories/{id}", get(handle_get_accessory))
        .route(
            "/api/accessories/{id}/characteristics/{name}",
            get(handle_get_characteristic).put(handle_set_characteristic),
        )
        .with_state(state)
}

async fn handle_list_accessories(State(state): State<AppState>) -> impl IntoResponse {
    let mut views = Vec::with_capacity(state.accessories.len());
    for accessory in state.accessories.iter() {
        views.push(accessory.view().await);
    }
    Json(views)
}

async fn handle_get_accessory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let Some(accessory) = state.find(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown accessory");
    };
    Json(accessory.view().await).into_response()
}

async fn handle_get_characteristic(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Response {
    let (accessory, characteristic) = match resolve(&state, &id, &name) {
        Ok(found) => found,
        Err(response) => return response,
    };
    characteristic_response(accessory, characteristic).await
}

async fn handle_set_characteristic(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (accessory, characteristic) = match resolve(&state, &id, &name) {
        Ok(found) => found,
        Err(response) => return response,
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    match accessory.set_characteristic(characteristic, value).await {
        Ok(()) => characteristic_response(accessory, characteristic).await,
        Err(CharacteristicError::Device(err)) => {
            warn!("{} write failed: {err}", accessory.name());
            error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn resolve<'a>(
    state: &'a AppState,
    id: &str,
    name: &str,
) -> Result<(&'a Arc<ThermostatAccessory>, Characteristic), Response> {
    let accessory = state
        .find(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Unknown accessory"))?;
    let characteristic = name
        .parse::<Characteristic>()
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, &err))?;
    Ok((accessory, characteristic))
}

async fn characteristic_response(
    accessory: &ThermostatAccessory,
    characteristic: Characteristic,
) -> Response {
    let value = accessory.get_characteristic(characteristic).await;
    Json(CharacteristicBody {
        characteristic: characteristic.as_str(),
        value,
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
