// /server/src/handlers/appeal_handler.rs
use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    error::{is_unique_violation, AppError},
    models::address::{self, Address, AddressPayload},
    models::appeal::{Appeal, AppealAdminOut, AppealMunicipalOut, AppealUserOut},
    models::user::{self, MunicipalCard, User, UserFull},
    state::AppState,
    validators,
};

// Видимость обращений задается ролью: администратор видит все,
// служба свой входящий поток, гражданин свои обращения.
async fn fetch_visible(
    state: &AppState,
    viewer: &AuthUser,
    id: Uuid,
) -> Result<Appeal, AppError> {
    let appeal = match viewer.role {
        Role::Admin => {
            sqlx::query_as::<_, Appeal>("SELECT * FROM appeals WHERE id = $1")
                .bind(id)
                .fetch_optional(&state.pool)
                .await?
        }
        Role::Municipal => {
            sqlx::query_as::<_, Appeal>(
                "SELECT * FROM appeals WHERE id = $1 AND municipal_id = $2",
            )
            .bind(id)
            .bind(viewer.id)
            .fetch_optional(&state.pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Appeal>("SELECT * FROM appeals WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(viewer.id)
                .fetch_optional(&state.pool)
                .await?
        }
    };
    // Чужое обращение неотличимо от несуществующего.
    appeal.ok_or(AppError::NotFound)
}

struct RelatedRows {
    users: HashMap<Uuid, User>,
    addresses: HashMap<Uuid, Address>,
}

async fn load_related(state: &AppState, appeals: &[Appeal]) -> Result<RelatedRows, AppError> {
    let mut user_ids: Vec<Uuid> = Vec::new();
    for appeal in appeals {
        if let Some(user_id) = appeal.user_id {
            user_ids.push(user_id);
        }
        user_ids.push(appeal.municipal_id);
    }
    let users = user::load_map(&state.pool, &user_ids).await?;

    let address_ids: Vec<Uuid> = appeals
        .iter()
        .filter_map(|a| a.address_id)
        .chain(users.values().filter_map(|u| u.address_id))
        .collect();
    let addresses = address::load_map(&state.pool, &address_ids).await?;

    Ok(RelatedRows { users, addresses })
}

impl RelatedRows {
    fn address(&self, id: Option<Uuid>) -> Option<Address> {
        id.and_then(|id| self.addresses.get(&id).cloned())
    }

    fn user_full(&self, id: Option<Uuid>) -> Option<UserFull> {
        id.and_then(|id| self.users.get(&id))
            .map(|u| UserFull::new(u, self.address(u.address_id)))
    }

    fn municipal_card(&self, id: Uuid) -> Option<MunicipalCard> {
        self.users
            .get(&id)
            .map(|u| MunicipalCard::new(u, self.address(u.address_id)))
    }
}

fn to_output(role: Role, appeal: Appeal, related: &RelatedRows) -> Result<Value, AppError> {
    let value = match role {
        Role::Admin => serde_json::to_value(AppealAdminOut {
            id: appeal.id,
            user: related.user_full(appeal.user_id),
            municipal: related.user_full(Some(appeal.municipal_id)),
            topic: appeal.topic,
            text: appeal.text,
            pub_date: appeal.pub_date,
            address: related.address(appeal.address_id),
            answer: appeal.answer,
            status: appeal.status,
            rating: appeal.rating,
        }),
        Role::Municipal => serde_json::to_value(AppealMunicipalOut {
            id: appeal.id,
            user: related.user_full(appeal.user_id),
            topic: appeal.topic,
            text: appeal.text,
            pub_date: appeal.pub_date,
            address: related.address(appeal.address_id),
            answer: appeal.answer,
            status: appeal.status,
            rating: appeal.rating,
        }),
        _ => serde_json::to_value(AppealUserOut {
            id: appeal.id,
            municipal: related.municipal_card(appeal.municipal_id),
            topic: appeal.topic,
            text: appeal.text,
            pub_date: appeal.pub_date,
            address: related.address(appeal.address_id),
            answer: appeal.answer,
            status: appeal.status,
            rating: appeal.rating,
        }),
    };
    value.map_err(|_| AppError::InternalServerError)
}

pub async fn list_appeals(
    State(state): State<AppState>,
    Extension(viewer): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let appeals = match viewer.role {
        Role::Admin => {
            sqlx::query_as::<_, Appeal>("SELECT * FROM appeals ORDER BY pub_date")
                .fetch_all(&state.pool)
                .await?
        }
        Role::Municipal => {
            sqlx::query_as::<_, Appeal>(
                "SELECT * FROM appeals WHERE municipal_id = $1 ORDER BY pub_date",
            )
            .bind(viewer.id)
            .fetch_all(&state.pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Appeal>(
                "SELECT * FROM appeals WHERE user_id = $1 ORDER BY pub_date",
            )
            .bind(viewer.id)
            .fetch_all(&state.pool)
            .await?
        }
    };

    let related = load_related(&state, &appeals).await?;
    let out: Vec<Value> = appeals
        .into_iter()
        .map(|a| to_output(viewer.role, a, &related))
        .collect::<Result<_, _>>()?;
    Ok(Json(Value::Array(out)))
}

pub async fn get_appeal(
    State(state): State<AppState>,
    Extension(viewer): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appeal = fetch_visible(&state, &viewer, id).await?;
    let related = load_related(&state, std::slice::from_ref(&appeal)).await?;
    Ok(Json(to_output(viewer.role, appeal, &related)?))
}

#[derive(Deserialize)]
pub struct AppealCreatePayload {
    pub municipal_id: Uuid,
    pub topic: String,
    pub text: String,
    pub address: Option<AddressPayload>,
}

pub async fn create_appeal(
    State(state): State<AppState>,
    Extension(viewer): Extension<AuthUser>,
    Json(payload): Json<AppealCreatePayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !viewer.role.can_create_appeal() {
        return Err(AppError::Forbidden);
    }

    let mut errors = Vec::new();
    if let Err(e) = validators::validate_max_len(
        &payload.topic,
        validators::APPEAL_TOPIC_MAX_LEN,
        "Длина темы не может превышать 50 символов.",
    ) {
        errors.push(("topic", e));
    }
    if let Err(e) = validators::validate_max_len(
        &payload.text,
        validators::APPEAL_TEXT_MAX_LEN,
        "Длина обращения не может превышать 2048 символов.",
    ) {
        errors.push(("text", e));
    }
    if let Some(addr) = &payload.address {
        errors.extend(addr.validate());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let municipal = User::by_id(&state.pool, payload.municipal_id)
        .await?
        .filter(|u| u.is_municipal)
        .ok_or_else(|| {
            AppError::Validation(vec![(
                "municipal_id",
                "Указанная муниципальная служба не существует.".to_string(),
            )])
        })?;

    let mut tx = state.pool.begin().await?;

    let address = match &payload.address {
        Some(a) => Some(address::get_or_create(&mut tx, a).await?),
        None => None,
    };

    let appeal = sqlx::query_as::<_, Appeal>(
        "INSERT INTO appeals (user_id, municipal_id, topic, text, address_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(viewer.id)
    .bind(municipal.id)
    .bind(&payload.topic)
    .bind(&payload.text)
    .bind(address.as_ref().map(|a| a.id))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "unique_user_text") {
            AppError::Conflict("Вы уже подавали обращение с таким текстом.".to_string())
        } else {
            e.into()
        }
    })?;

    tx.commit().await?;

    // Ответ всегда в представлении гражданина, как и при чтении.
    let municipal_address = match municipal.address_id {
        Some(id) => address::by_id(&state.pool, id).await?,
        None => None,
    };
    let out = AppealUserOut {
        id: appeal.id,
        municipal: Some(MunicipalCard::new(&municipal, municipal_address)),
        topic: appeal.topic,
        text: appeal.text,
        pub_date: appeal.pub_date,
        address,
        answer: appeal.answer,
        status: appeal.status,
        rating: appeal.rating,
    };
    let value = serde_json::to_value(out).map_err(|_| AppError::InternalServerError)?;
    Ok((StatusCode::CREATED, Json(value)))
}

#[derive(Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
}

pub async fn post_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<Value>, AppError> {
    if !viewer.role.can_answer_appeal() {
        return Err(AppError::Forbidden);
    }
    if let Err(e) = validators::validate_max_len(
        &payload.answer,
        validators::APPEAL_TEXT_MAX_LEN,
        "Длина ответа не может превышать 2048 символов.",
    ) {
        return Err(AppError::Validation(vec![("answer", e)]));
    }

    let appeal = fetch_visible(&state, &viewer, id).await?;
    appeal.ensure_answerable()?;

    // Гонку двух одновременных ответов решает предикат обновления:
    // фиксируется первый, проигравший получает конфликт.
    let result = sqlx::query(
        "UPDATE appeals SET answer = $1, status = 'completed'
         WHERE id = $2 AND answer IS NULL",
    )
    .bind(&payload.answer)
    .bind(appeal.id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Вы уже дали официальный ответ обращению.".to_string(),
        ));
    }

    Ok(Json(json!({ "answer": "Ответ обращению оставлен." })))
}

#[derive(Deserialize)]
pub struct RatingPayload {
    pub rating: i16,
}

pub async fn rate_answer(
    State(state): State<AppState>,
    Extension(viewer): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingPayload>,
) -> Result<Json<Value>, AppError> {
    if !viewer.role.can_rate_appeal() {
        return Err(AppError::Forbidden);
    }

    let appeal = fetch_visible(&state, &viewer, id).await?;
    appeal.ensure_ratable()?;

    if !(0..=validators::APPEAL_RATING_MAX_VAL).contains(&payload.rating) {
        return Err(AppError::Validation(vec![(
            "rating",
            "Оценка не может быть меньше 0 и больше 10.".to_string(),
        )]));
    }

    // Статус перепроверяется предикатом на случай гонки с повторным чтением.
    let result = sqlx::query(
        "UPDATE appeals SET rating = $1 WHERE id = $2 AND status = 'completed'",
    )
    .bind(payload.rating)
    .bind(appeal.id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ActionForbidden(
            "Вы не можете поставить оценку незавершенному обращению.".to_string(),
        ));
    }

    Ok(Json(json!({ "rating": "Благодарим за оценку ответа!" })))
}
