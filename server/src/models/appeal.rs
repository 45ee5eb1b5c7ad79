// /server/src/models/appeal.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;
use crate::models::user::{MunicipalCard, UserFull};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appeal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Initial,
    InProgress,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Appeal {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub municipal_id: Uuid,
    pub topic: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub address_id: Option<Uuid>,
    pub answer: Option<String>,
    pub status: AppealStatus,
    pub rating: Option<i16>,
}

impl Appeal {
    /// Ответ дается ровно один раз; повторная попытка -> конфликт.
    pub fn ensure_answerable(&self) -> Result<(), AppError> {
        if self.answer.is_some() {
            return Err(AppError::Conflict(
                "Вы уже дали официальный ответ обращению.".to_string(),
            ));
        }
        Ok(())
    }

    /// Оценка доступна только по завершенному обращению.
    pub fn ensure_ratable(&self) -> Result<(), AppError> {
        if self.status != AppealStatus::Completed {
            return Err(AppError::ActionForbidden(
                "Вы не можете поставить оценку незавершенному обращению.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Представление для администратора: видны обе стороны обращения.
#[derive(Debug, Serialize)]
pub struct AppealAdminOut {
    pub id: Uuid,
    pub user: Option<UserFull>,
    pub municipal: Option<UserFull>,
    pub topic: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub address: Option<Address>,
    pub answer: Option<String>,
    pub status: AppealStatus,
    pub rating: Option<i16>,
}

/// Представление для муниципальной службы: виден заявитель.
#[derive(Debug, Serialize)]
pub struct AppealMunicipalOut {
    pub id: Uuid,
    pub user: Option<UserFull>,
    pub topic: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub address: Option<Address>,
    pub answer: Option<String>,
    pub status: AppealStatus,
    pub rating: Option<i16>,
}

/// Представление для гражданина: видна карточка службы.
#[derive(Debug, Serialize)]
pub struct AppealUserOut {
    pub id: Uuid,
    pub municipal: Option<MunicipalCard>,
    pub topic: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub address: Option<Address>,
    pub answer: Option<String>,
    pub status: AppealStatus,
    pub rating: Option<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appeal(status: AppealStatus, answer: Option<&str>) -> Appeal {
        Appeal {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            municipal_id: Uuid::new_v4(),
            topic: "Разбитая дорога".to_string(),
            text: "Во дворе яма.".to_string(),
            pub_date: Utc::now(),
            address_id: None,
            answer: answer.map(str::to_string),
            status,
            rating: None,
        }
    }

    #[test]
    fn fresh_appeal_is_answerable() {
        assert!(appeal(AppealStatus::Initial, None).ensure_answerable().is_ok());
    }

    #[test]
    fn second_answer_is_a_conflict() {
        let err = appeal(AppealStatus::Completed, Some("Работы выполнены."))
            .ensure_answerable()
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn only_completed_appeal_is_ratable() {
        assert!(appeal(AppealStatus::Completed, Some("Готово."))
            .ensure_ratable()
            .is_ok());
        for status in [
            AppealStatus::Initial,
            AppealStatus::InProgress,
            AppealStatus::Rejected,
        ] {
            let err = appeal(status, None).ensure_ratable().unwrap_err();
            assert!(matches!(err, AppError::ActionForbidden(_)));
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(AppealStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        assert_eq!(
            serde_json::to_value(AppealStatus::Initial).unwrap(),
            serde_json::json!("initial")
        );
    }
}
