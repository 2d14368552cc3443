//! HTTP inspection/control surface over the in-process API.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use contracts::{
    ApiError, Command, CommandResult, ErrorCode, Event, KernelStatus, LockedVehicleSummary,
};

use crate::EngineApi;

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

type SharedApi = Arc<Mutex<EngineApi>>;

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn player_not_found(player_id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::PlayerNotFound,
                "unknown player_id",
                Some(format!("player_id={player_id}")),
            ),
        }
    }

    fn entity_not_found(entity_id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::EntityNotFound,
                "unknown vehicle_id",
                Some(format!("vehicle_id={entity_id}")),
            ),
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

/// Serve the inspection/control API until the listener fails.
pub async fn serve(addr: SocketAddr, api: EngineApi) -> Result<(), ServerError> {
    let router = router(Arc::new(Mutex::new(api)));
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn router(state: SharedApi) -> Router {
    Router::new()
        .route("/v1/status", get(get_status))
        .route("/v1/locks", get(get_locks))
        .route("/v1/events", get(get_events))
        .route("/v1/access", get(get_access))
        .route("/v1/commands", post(post_command))
        .route("/v1/step", post(post_step))
        .with_state(state)
}

async fn get_status(State(api): State<SharedApi>) -> Json<KernelStatus> {
    Json(api.lock().await.status())
}

async fn get_locks(State(api): State<SharedApi>) -> Json<Vec<LockedVehicleSummary>> {
    Json(api.lock().await.locked_vehicles())
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    /// Return events with sequence strictly greater than this.
    #[serde(default)]
    since: u64,
}

async fn get_events(
    State(api): State<SharedApi>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<Event>> {
    Json(api.lock().await.events_since(query.since).to_vec())
}

#[derive(Debug, Deserialize)]
struct AccessQuery {
    player_id: u64,
    vehicle_id: u64,
}

async fn get_access(
    State(api): State<SharedApi>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<serde_json::Value>, HttpApiError> {
    let mut api = api.lock().await;
    if api.world().player(query.player_id).is_none() {
        return Err(HttpApiError::player_not_found(query.player_id));
    }
    if api.world().entity(query.vehicle_id).is_none() {
        return Err(HttpApiError::entity_not_found(query.vehicle_id));
    }
    let allowed = api.can_access(query.player_id, query.vehicle_id);
    Ok(Json(json!({
        "player_id": query.player_id.to_string(),
        "vehicle_id": query.vehicle_id,
        "allowed": allowed,
    })))
}

async fn post_command(
    State(api): State<SharedApi>,
    Json(command): Json<Command>,
) -> (StatusCode, Json<CommandResult>) {
    let result = api.lock().await.submit_command(command);
    let status = if result.error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(result))
}

#[derive(Debug, Deserialize)]
struct StepBody {
    #[serde(default = "default_step_ticks")]
    ticks: u64,
}

fn default_step_ticks() -> u64 {
    1
}

async fn post_step(
    State(api): State<SharedApi>,
    Json(body): Json<StepBody>,
) -> Json<KernelStatus> {
    Json(api.lock().await.step(body.ticks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CommandPayload, CommandType, LockConfig, LockKind, Vec3};
    use lock_core::world::{VehicleWorld, MINICOPTER_PREFAB};

    fn shared_api() -> (SharedApi, u64, u64) {
        let mut world = VehicleWorld::new(LockConfig::default(), 42);
        let player = world.spawn_player("avery");
        world.grant_permission(player, LockKind::Code.permission_all_vehicles());
        world.give_item(player, "lock.code", 1);
        let minicopter = world.spawn_vehicle(MINICOPTER_PREFAB, Vec3::new(1.0, 0.0, 0.0));
        world.set_look_target(player, Some(minicopter));
        (
            Arc::new(Mutex::new(EngineApi::with_world(world))),
            player,
            minicopter,
        )
    }

    #[tokio::test]
    async fn status_and_command_round_trip() {
        let (api, player, minicopter) = shared_api();

        let status = get_status(State(api.clone())).await;
        assert_eq!(status.0.current_tick, 0);

        let command = Command::new(
            "cmd_http",
            0,
            CommandType::DeployCodeLock,
            CommandPayload::DeployCodeLock { player_id: player },
        );
        let (status_code, result) = post_command(State(api.clone()), Json(command)).await;
        assert_eq!(status_code, StatusCode::OK);
        assert!(result.0.accepted);

        let locks = get_locks(State(api.clone())).await;
        assert_eq!(locks.0.len(), 1);
        assert_eq!(locks.0[0].vehicle_id, minicopter);
    }

    #[tokio::test]
    async fn access_query_validates_ids() {
        let (api, player, minicopter) = shared_api();

        let ok = get_access(
            State(api.clone()),
            Query(AccessQuery {
                player_id: player,
                vehicle_id: minicopter,
            }),
        )
        .await
        .expect("valid query");
        assert_eq!(ok.0["allowed"], json!(true));

        let err = get_access(
            State(api.clone()),
            Query(AccessQuery {
                player_id: 9999,
                vehicle_id: minicopter,
            }),
        )
        .await
        .expect_err("unknown player");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn step_advances_the_clock() {
        let (api, _player, _minicopter) = shared_api();
        let status = post_step(State(api.clone()), Json(StepBody { ticks: 5 })).await;
        assert_eq!(status.0.current_tick, 5);
    }

    #[test]
    fn router_builds() {
        let (api, _player, _minicopter) = shared_api();
        let _router = router(api);
    }
}
