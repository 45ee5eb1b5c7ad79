// /server/src/handlers/news_handler.rs
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
    auth::MaybeUser,
    error::{is_unique_violation, AppError},
    models::address::{self, AddressPayload},
    models::news::{
        validate_pictures, validate_quiz, AnswerOut, CommentOut, News, NewsCategory,
        NewsComment, NewsOut, NewsPicture, PictureOut, Quiz, QuizOut, QuizPayload,
    },
    models::user::{self, MunicipalCard, UserShort},
    state::AppState,
    validators,
};

#[derive(sqlx::FromRow)]
struct AnswerCountRow {
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    user_count: i64,
}

// Новость отдается с вложенными категорией, адресом, карточкой службы,
// комментариями, картинками и опросом со счетчиками голосов.
async fn render_news(state: &AppState, news: Vec<News>) -> Result<Vec<NewsOut>, AppError> {
    if news.is_empty() {
        return Ok(Vec::new());
    }

    let news_ids: Vec<Uuid> = news.iter().map(|n| n.id).collect();

    let category_ids: Vec<Uuid> = news.iter().map(|n| n.category_id).collect();
    let categories: HashMap<Uuid, String> = sqlx::query_as::<_, NewsCategory>(
        "SELECT * FROM news_categories WHERE id = ANY($1)",
    )
    .bind(&category_ids)
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .map(|c| (c.id, c.name))
    .collect();

    let municipal_ids: Vec<Uuid> = news.iter().map(|n| n.municipal_id).collect();
    let municipals = user::load_map(&state.pool, &municipal_ids).await?;

    let comments = sqlx::query_as::<_, NewsComment>(
        "SELECT * FROM news_comments WHERE news_id = ANY($1) ORDER BY pub_date",
    )
    .bind(&news_ids)
    .fetch_all(&state.pool)
    .await?;
    let author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
    let authors = user::load_map(&state.pool, &author_ids).await?;

    let pictures = sqlx::query_as::<_, NewsPicture>(
        "SELECT * FROM news_pictures WHERE news_id = ANY($1) ORDER BY picture",
    )
    .bind(&news_ids)
    .fetch_all(&state.pool)
    .await?;

    let address_ids: Vec<Uuid> = news
        .iter()
        .map(|n| n.address_id)
        .chain(municipals.values().filter_map(|u| u.address_id))
        .collect();
    let addresses = address::load_map(&state.pool, &address_ids).await?;

    let quiz_ids: Vec<Uuid> = news.iter().filter_map(|n| n.quiz_id).collect();
    let quizzes: HashMap<Uuid, Quiz> =
        sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ANY($1)")
            .bind(&quiz_ids)
            .fetch_all(&state.pool)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
    let answers = sqlx::query_as::<_, AnswerCountRow>(
        "SELECT a.id, a.quiz_id, a.text, COUNT(au.id) AS user_count
         FROM quiz_answers a
         LEFT JOIN quiz_answer_users au ON au.answer_id = a.id
         WHERE a.quiz_id = ANY($1)
         GROUP BY a.id
         ORDER BY a.ord",
    )
    .bind(&quiz_ids)
    .fetch_all(&state.pool)
    .await?;

    let mut out = Vec::with_capacity(news.len());
    for item in news {
        let municipal = municipals.get(&item.municipal_id).map(|u| {
            MunicipalCard::new(u, u.address_id.and_then(|id| addresses.get(&id).cloned()))
        });

        let quiz = item.quiz_id.and_then(|quiz_id| {
            quizzes.get(&quiz_id).map(|q| QuizOut {
                id: q.id,
                title: q.title.clone(),
                answers: answers
                    .iter()
                    .filter(|a| a.quiz_id == quiz_id)
                    .map(|a| AnswerOut {
                        id: a.id,
                        text: a.text.clone(),
                        user_count: a.user_count,
                    })
                    .collect(),
            })
        });

        out.push(NewsOut {
            id: item.id,
            municipal,
            category: categories
                .get(&item.category_id)
                .cloned()
                .unwrap_or_default(),
            text: item.text,
            address: addresses.get(&item.address_id).cloned(),
            pub_date: item.pub_date,
            comment: comments
                .iter()
                .filter(|c| c.news_id == item.id)
                .map(|c| CommentOut {
                    id: c.id,
                    author: authors.get(&c.author_id).map(UserShort::new),
                    text: c.text.clone(),
                    pub_date: c.pub_date,
                })
                .collect(),
            quiz,
            picture: pictures
                .iter()
                .filter(|p| p.news_id == item.id)
                .map(|p| PictureOut {
                    id: p.id,
                    picture: p.picture.clone(),
                })
                .collect(),
        });
    }
    Ok(out)
}

pub async fn list_news(
    State(state): State<AppState>,
) -> Result<Json<Vec<NewsOut>>, AppError> {
    let news = sqlx::query_as::<_, News>("SELECT * FROM news ORDER BY pub_date")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(render_news(&state, news).await?))
}

pub async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NewsOut>, AppError> {
    let news = sqlx::query_as::<_, News>("SELECT * FROM news WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let out = render_news(&state, vec![news])
        .await?
        .pop()
        .ok_or(AppError::InternalServerError)?;
    Ok(Json(out))
}

#[derive(Deserialize)]
pub struct PicturePayload {
    pub picture: String,
}

#[derive(Deserialize)]
pub struct NewsCreatePayload {
    pub category: String,
    pub text: String,
    pub address: AddressPayload,
    pub quiz: Option<QuizPayload>,
    pub pictures: Option<Vec<PicturePayload>>,
}

/// Публикация новости: адрес, опрос с вариантами и картинки создаются
/// в одной транзакции, частичных результатов не остается.
pub async fn create_news(
    State(state): State<AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Json(payload): Json<NewsCreatePayload>,
) -> Result<(StatusCode, Json<NewsOut>), AppError> {
    let viewer = viewer.0.ok_or(AppError::Unauthorized)?;
    if !viewer.role.can_create_news() {
        return Err(AppError::Forbidden);
    }

    let mut errors = Vec::new();
    if let Err(e) = validators::validate_max_len(
        &payload.text,
        validators::NEWS_TEXT_MAX_LEN,
        "Длина новости не может превышать 2048 символов.",
    ) {
        errors.push(("text", e));
    }
    errors.extend(payload.address.validate());
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    if let Some(quiz) = &payload.quiz {
        validate_quiz(quiz)?;
    }
    if let Some(pictures) = &payload.pictures {
        let paths: Vec<&str> = pictures.iter().map(|p| p.picture.as_str()).collect();
        validate_pictures(&paths)?;
    }

    let category = sqlx::query_as::<_, NewsCategory>(
        "SELECT * FROM news_categories WHERE name = $1",
    )
    .bind(&payload.category)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        AppError::Validation(vec![(
            "category",
            "Указанной категории новостей не существует.".to_string(),
        )])
    })?;

    let mut tx = state.pool.begin().await?;

    let address = address::get_or_create(&mut tx, &payload.address).await?;

    let quiz_id = match &payload.quiz {
        Some(q) => {
            let quiz = sqlx::query_as::<_, Quiz>(
                "INSERT INTO quizzes (title) VALUES ($1) RETURNING *",
            )
            .bind(&q.title)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, "quizzes_title_key") {
                    AppError::Conflict("Опрос с таким заголовком уже существует.".to_string())
                } else {
                    e.into()
                }
            })?;
            for (i, answer) in q.answers.iter().enumerate() {
                sqlx::query("INSERT INTO quiz_answers (quiz_id, text, ord) VALUES ($1, $2, $3)")
                    .bind(quiz.id)
                    .bind(answer)
                    .bind(i as i16)
                    .execute(&mut *tx)
                    .await?;
            }
            Some(quiz.id)
        }
        None => None,
    };

    let news = sqlx::query_as::<_, News>(
        "INSERT INTO news (municipal_id, category_id, text, address_id, quiz_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(viewer.id)
    .bind(category.id)
    .bind(&payload.text)
    .bind(address.id)
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "news_text_key") {
            AppError::Conflict("Такая новость уже опубликована.".to_string())
        } else {
            e.into()
        }
    })?;

    if let Some(pictures) = &payload.pictures {
        let paths: Vec<String> = pictures.iter().map(|p| p.picture.clone()).collect();
        sqlx::query(
            "INSERT INTO news_pictures (news_id, picture)
             SELECT $1, unnest($2::text[])",
        )
        .bind(news.id)
        .bind(&paths)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    // Уведомление граждан уходит через очередь, запрос его не ждет.
    let recipients: Vec<String> = sqlx::query_scalar(
        "SELECT email FROM users WHERE is_staff = FALSE AND is_municipal = FALSE",
    )
    .fetch_all(&state.pool)
    .await?;
    state
        .mailer
        .send_mass_mail("Новости городского портала", &news.text, &recipients);

    let out = render_news(&state, vec![news])
        .await?
        .pop()
        .ok_or(AppError::InternalServerError)?;
    Ok((StatusCode::CREATED, Json(out)))
}

#[derive(Deserialize)]
pub struct CommentPayload {
    pub text: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let viewer = viewer.0.ok_or(AppError::Unauthorized)?;
    if !viewer.role.can_comment() {
        return Err(AppError::Forbidden);
    }
    if let Err(e) = validators::validate_max_len(
        &payload.text,
        validators::NEWS_COMMENT_MAX_LEN,
        "Длина комментария не может превышать 128 символов.",
    ) {
        return Err(AppError::Validation(vec![("text", e)]));
    }

    let news_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM news WHERE id = $1)")
            .bind(id)
            .fetch_one(&state.pool)
            .await?;
    if !news_exists {
        return Err(AppError::NotFound);
    }

    sqlx::query("INSERT INTO news_comments (author_id, news_id, text) VALUES ($1, $2, $3)")
        .bind(viewer.id)
        .bind(id)
        .bind(&payload.text)
        .execute(&state.pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "comment": "Ваш комментарий опубликован!" })),
    ))
}

#[derive(Deserialize)]
pub struct VotePayload {
    pub answer: Uuid,
}

/// Голос в опросе новости. Один голос на опрос на пользователя.
pub async fn vote(
    State(state): State<AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VotePayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let viewer = viewer.0.ok_or(AppError::Unauthorized)?;
    if !viewer.role.can_vote() {
        return Err(AppError::Forbidden);
    }

    let news = sqlx::query_as::<_, News>("SELECT * FROM news WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let quiz_id = news.quiz_id.ok_or(AppError::NotFound)?;

    let answer_in_quiz: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM quiz_answers WHERE id = $1 AND quiz_id = $2)",
    )
    .bind(payload.answer)
    .bind(quiz_id)
    .fetch_one(&state.pool)
    .await?;
    if !answer_in_quiz {
        return Err(AppError::NotFound);
    }

    // Повторный голос, в том числе за другой вариант того же опроса,
    // отсекается ограничением уникальности (quiz_id, user_id): проверка
    // в коде перед вставкой оставляла бы окно между двумя транзакциями.
    sqlx::query(
        "INSERT INTO quiz_answer_users (answer_id, quiz_id, user_id) VALUES ($1, $2, $3)",
    )
    .bind(payload.answer)
    .bind(quiz_id)
    .bind(viewer.id)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "unique_quiz_user")
            || is_unique_violation(&e, "unique_answer_user")
        {
            AppError::Conflict("Вы уже голосовали в этом опросе.".to_string())
        } else {
            e.into()
        }
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "vote": "Ваш голос учтен!" }))))
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/0001_schema.sql");

    fn table_ddl(name: &str) -> &'static str {
        SCHEMA
            .split(&format!("CREATE TABLE {name}"))
            .nth(1)
            .and_then(|rest| rest.split(';').next())
            .unwrap()
    }

    // Два голоса одного пользователя за разные варианты одного опроса
    // должны упираться в ограничение схемы, а не только в код.
    #[test]
    fn vote_uniqueness_spans_the_whole_quiz() {
        let votes = table_ddl("quiz_answer_users");
        assert!(votes.contains("unique_quiz_user UNIQUE (quiz_id, user_id)"));
        assert!(votes.contains("unique_answer_user UNIQUE (answer_id, user_id)"));
    }
}
