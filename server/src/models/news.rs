// /server/src/models/news.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;
use crate::models::user::{MunicipalCard, UserShort};
use crate::validators::{QUIZ_ANSWER_MAX_LEN, QUIZ_TITLE_MAX_LEN};

// Картинки новостей живут под фиксированным префиксом медиа-каталога.
pub const NEWS_PICTURES_PATH: &str = "news/pictures/";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct News {
    pub id: Uuid,
    pub municipal_id: Uuid,
    pub category_id: Uuid,
    pub text: String,
    pub address_id: Uuid,
    pub pub_date: DateTime<Utc>,
    pub quiz_id: Option<Uuid>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsComment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub news_id: Uuid,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsPicture {
    pub id: Uuid,
    pub news_id: Uuid,
    pub picture: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub municipal_id: Uuid,
    pub address_id: Uuid,
    pub pub_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizPayload {
    pub title: String,
    pub answers: Vec<String>,
}

/// Проверяет опрос перед созданием: заголовок, количество и длина
/// вариантов, отсутствие дублей.
pub fn validate_quiz(quiz: &QuizPayload) -> Result<(), AppError> {
    if quiz.title.is_empty() || quiz.title.chars().count() > QUIZ_TITLE_MAX_LEN {
        return Err(AppError::Validation(vec![(
            "quiz",
            format!(
                "Длина заголовка опроса не может превышать {QUIZ_TITLE_MAX_LEN} символов."
            ),
        )]));
    }
    if quiz.answers.len() < 2 {
        return Err(AppError::Validation(vec![(
            "answers",
            "В опросе не может быть менее 2 вариантов ответа.".to_string(),
        )]));
    }
    for answer in &quiz.answers {
        if answer.chars().count() > QUIZ_ANSWER_MAX_LEN {
            return Err(AppError::Validation(vec![(
                "answers",
                format!(
                    "Длина варианта ответа не может превышать {QUIZ_ANSWER_MAX_LEN} символов."
                ),
            )]));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for answer in &quiz.answers {
        if !seen.insert(answer.as_str()) {
            return Err(AppError::Validation(vec![(
                "answers",
                "Варианты ответа не должны повторяться.".to_string(),
            )]));
        }
    }
    Ok(())
}

/// Проверяет пути картинок новости: фиксированный префикс медиа-каталога
/// и отсутствие дублей (дубль нарушил бы уникальность на вставке).
pub fn validate_pictures(paths: &[&str]) -> Result<(), AppError> {
    if paths.iter().any(|p| !p.starts_with(NEWS_PICTURES_PATH)) {
        return Err(AppError::Validation(vec![(
            "pictures",
            format!("Путь картинки должен начинаться с {NEWS_PICTURES_PATH}."),
        )]));
    }
    let mut seen = std::collections::HashSet::new();
    for path in paths {
        if !seen.insert(*path) {
            return Err(AppError::Validation(vec![(
                "pictures",
                "Картинки в новости не должны повторяться.".to_string(),
            )]));
        }
    }
    Ok(())
}

// Выходные представления собираются обработчиками из нескольких выборок.

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub id: Uuid,
    pub text: String,
    pub user_count: i64,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "answer")]
    pub answers: Vec<AnswerOut>,
}

#[derive(Debug, Serialize)]
pub struct CommentOut {
    pub id: Uuid,
    pub author: Option<UserShort>,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PictureOut {
    pub id: Uuid,
    pub picture: String,
}

#[derive(Debug, Serialize)]
pub struct NewsOut {
    pub id: Uuid,
    pub municipal: Option<MunicipalCard>,
    pub category: String,
    pub text: String,
    pub address: Option<Address>,
    pub pub_date: DateTime<Utc>,
    pub comment: Vec<CommentOut>,
    pub quiz: Option<QuizOut>,
    pub picture: Vec<PictureOut>,
}

#[derive(Debug, Serialize)]
pub struct TaskOut {
    pub id: Uuid,
    pub title: String,
    pub municipal: Option<MunicipalCard>,
    pub address: Option<Address>,
    pub pub_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(answers: &[&str]) -> QuizPayload {
        QuizPayload {
            title: "Как вам новая детская площадка?".to_string(),
            answers: answers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn single_option_is_rejected() {
        assert!(validate_quiz(&quiz(&["Отлично"])).is_err());
    }

    #[test]
    fn two_options_are_accepted() {
        assert!(validate_quiz(&quiz(&["Отлично", "Плохо"])).is_ok());
    }

    #[test]
    fn overlong_option_is_rejected() {
        let long = "а".repeat(QUIZ_ANSWER_MAX_LEN + 1);
        assert!(validate_quiz(&quiz(&["Отлично", &long])).is_err());
        let edge = "а".repeat(QUIZ_ANSWER_MAX_LEN);
        assert!(validate_quiz(&quiz(&["Отлично", &edge])).is_ok());
    }

    #[test]
    fn duplicate_options_are_rejected() {
        assert!(validate_quiz(&quiz(&["Да", "Да"])).is_err());
    }

    #[test]
    fn overlong_title_is_rejected() {
        let mut q = quiz(&["Да", "Нет"]);
        q.title = "а".repeat(QUIZ_TITLE_MAX_LEN + 1);
        assert!(validate_quiz(&q).is_err());
    }

    #[test]
    fn pictures_must_live_under_the_media_prefix() {
        assert!(validate_pictures(&["news/pictures/yama.jpg"]).is_ok());
        assert!(validate_pictures(&["avatars/yama.jpg"]).is_err());
    }

    #[test]
    fn duplicate_pictures_are_a_field_error() {
        let err = validate_pictures(&[
            "news/pictures/yama.jpg",
            "news/pictures/most.jpg",
            "news/pictures/yama.jpg",
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(fields)
            if fields.iter().any(|(f, _)| *f == "pictures")));
    }

    #[test]
    fn empty_picture_list_is_fine() {
        assert!(validate_pictures(&[]).is_ok());
    }
}
