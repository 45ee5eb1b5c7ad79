// /server/src/handlers/task_handler.rs
use axum::{extract::State, Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::address,
    models::news::{Task, TaskOut},
    models::user::{self, MunicipalCard},
    state::AppState,
};

/// Публичный список плановых работ муниципальных служб.
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskOut>>, AppError> {
    let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY start_date")
        .fetch_all(&state.pool)
        .await?;

    let municipal_ids: Vec<Uuid> = tasks.iter().map(|t| t.municipal_id).collect();
    let municipals = user::load_map(&state.pool, &municipal_ids).await?;

    let address_ids: Vec<Uuid> = tasks
        .iter()
        .map(|t| t.address_id)
        .chain(municipals.values().filter_map(|u| u.address_id))
        .collect();
    let addresses = address::load_map(&state.pool, &address_ids).await?;

    let out = tasks
        .into_iter()
        .map(|task| TaskOut {
            id: task.id,
            title: task.title,
            municipal: municipals.get(&task.municipal_id).map(|u| {
                MunicipalCard::new(u, u.address_id.and_then(|id| addresses.get(&id).cloned()))
            }),
            address: addresses.get(&task.address_id).cloned(),
            pub_date: task.pub_date,
            start_date: task.start_date,
            end_date: task.end_date,
        })
        .collect();

    Ok(Json(out))
}
