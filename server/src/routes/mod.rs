// /server/src/routes/mod.rs
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    auth::{auth_middleware, optional_auth_middleware},
    config::AuthScheme,
    handlers::{appeal_handler, news_handler, task_handler, user_handler},
    state::AppState,
};

pub fn create_router(app_state: AppState) -> Router {
    // Публичные маршруты: личность учитывается, если предъявлена,
    // обязательность решают сами обработчики.
    let public_routes = Router::new()
        .route(
            "/users/",
            get(user_handler::list_users).post(user_handler::register),
        )
        .route(
            "/users/confirm_email/",
            post(user_handler::confirm_email),
        )
        .route(
            "/news/",
            get(news_handler::list_news).post(news_handler::create_news),
        )
        .route("/news/:id/", get(news_handler::get_news))
        .route("/news/:id/add_comment/", post(news_handler::add_comment))
        .route("/news/:id/vote/", post(news_handler::vote))
        .route("/tasks/", get(task_handler::list_tasks))
        .route("/docs/", get(docs))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth_middleware,
        ));

    // Схема выдачи токена задается конфигурацией при старте.
    let token_routes = match app_state.config.auth_scheme {
        AuthScheme::Token => Router::new().route(
            "/token/create/",
            post(user_handler::obtain_auth_token),
        ),
        AuthScheme::Jwt => Router::new()
            .route("/token/create/", post(user_handler::obtain_jwt_pair))
            .route("/token/refresh/", post(user_handler::refresh_jwt)),
    };

    let protected_routes = Router::new()
        .route(
            "/appeals/",
            get(appeal_handler::list_appeals).post(appeal_handler::create_appeal),
        )
        .route("/appeals/:id/", get(appeal_handler::get_appeal))
        .route(
            "/appeals/:id/post_answer/",
            post(appeal_handler::post_answer),
        )
        .route(
            "/appeals/:id/rate_answer/",
            post(appeal_handler::rate_answer),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(token_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

// Статическое описание API вместо генерации схемы.
async fn docs() -> Json<Value> {
    Json(json!({
        "title": "Городской портал",
        "version": "v1",
        "endpoints": {
            "POST /api/v1/users/": "Регистрация гражданина",
            "GET /api/v1/users/": "Список пользователей (?is_municipal=true — службы)",
            "POST /api/v1/users/confirm_email/": "Код подтверждения почты",
            "POST /api/v1/token/create/": "Получение токена по email и паролю",
            "POST /api/v1/token/refresh/": "Обновление JWT (только схема jwt)",
            "GET /api/v1/appeals/": "Обращения, видимые вызывающему",
            "POST /api/v1/appeals/": "Подача обращения (гражданин)",
            "GET /api/v1/appeals/:id/": "Обращение по идентификатору",
            "POST /api/v1/appeals/:id/post_answer/": "Официальный ответ (служба)",
            "POST /api/v1/appeals/:id/rate_answer/": "Оценка ответа (гражданин)",
            "GET /api/v1/news/": "Лента новостей",
            "POST /api/v1/news/": "Публикация новости (служба)",
            "GET /api/v1/news/:id/": "Новость по идентификатору",
            "POST /api/v1/news/:id/add_comment/": "Комментарий к новости",
            "POST /api/v1/news/:id/vote/": "Голос в опросе новости",
            "GET /api/v1/tasks/": "Плановые работы служб",
            "GET /media/": "Медиафайлы"
        }
    }))
}
