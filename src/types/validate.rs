//! Input checks run before a mutation is sent. A failed check means no
//! request is issued and the cache is left alone.

use super::dto::{
    CreatePlaceDto, CreateScheduleDto, LoginDto, PointDto, RegisterDto, UpdatePasswordDto,
    UpdatePlaceDto, UpdateProfileDto, UpdateScheduleDto,
};
use serde::Serialize;
use thiserror::Error as ThisError;

const PASSWORD_SPECIALS: &str = "!@#$%^&*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ThisError)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.trim().is_empty() {
        errors.push("name", "Name is required");
        return;
    }
    if !name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace()) {
        errors.push("name", "Name must contain only letters and spaces");
    }
    if name.chars().count() > 50 {
        errors.push("name", "Name must be at most 50 characters");
    }
}

fn check_login(errors: &mut ValidationErrors, login: &str) {
    let len = login.chars().count();
    if login.is_empty() {
        errors.push("login", "Login is required");
    } else if len < 3 {
        errors.push("login", "Login must be at least 3 characters");
    } else if len > 15 {
        errors.push("login", "Login must be at most 15 characters");
    }
}

fn check_password(errors: &mut ValidationErrors, field: &'static str, password: &str) {
    let len = password.chars().count();
    if password.is_empty() {
        errors.push(field, "Password is required");
        return;
    }
    if len < 6 {
        errors.push(field, "Password must be at least 6 characters");
    }
    if len > 20 {
        errors.push(field, "Password must be at most 20 characters");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(field, "Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(field, "Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(field, "Password must contain at least one digit");
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        errors.push(field, "Password must contain at least one special character");
    }
}

fn check_points(errors: &mut ValidationErrors, points: &[PointDto]) {
    if points.len() < 2 {
        errors.push("points", "Schedule must have at least 2 points");
    }
    if points.iter().any(|p| p.place_id <= 0) {
        errors.push("points", "Place is required");
    }
}

impl Validate for RegisterDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_name(&mut errors, &self.name);
        check_login(&mut errors, &self.login);
        check_password(&mut errors, "password", &self.password);
        errors.into_result()
    }
}

impl Validate for LoginDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.login.is_empty() {
            errors.push("login", "Login is required");
        }
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.into_result()
    }
}

impl Validate for UpdateProfileDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        check_login(&mut errors, self.login.as_deref().unwrap_or_default());
        errors.into_result()
    }
}

impl Validate for UpdatePasswordDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.old_password.is_empty() {
            errors.push("oldPassword", "Password is required");
        }
        check_password(&mut errors, "newPassword", &self.new_password);
        errors.into_result()
    }
}

impl Validate for CreatePlaceDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        }
        errors.into_result()
    }
}

impl Validate for UpdatePlaceDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            errors.push("name", "Name is required");
        }
        errors.into_result()
    }
}

impl Validate for CreateScheduleDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_points(&mut errors, &self.points);
        errors.into_result()
    }
}

impl Validate for UpdateScheduleDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(points) = &self.points {
            check_points(&mut errors, points);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::models::{Role, TrainType};
    use chrono::Utc;

    #[test]
    fn register_collects_every_password_rule() {
        let dto = RegisterDto {
            name: "Ada Lovelace".into(),
            login: "ada".into(),
            password: "abc".into(),
            role: Role::User,
        };
        let err = dto.validate().unwrap_err();
        let fields: Vec<_> = err.fields().iter().map(|e| e.field).collect();
        assert!(fields.iter().all(|f| *f == "password"));
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn register_accepts_strong_input() {
        let dto = RegisterDto {
            name: "Ada".into(),
            login: "ada_l".into(),
            password: "Secr3t!x".into(),
            role: Role::Admin,
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn schedule_needs_two_points() {
        let dto = CreateScheduleDto {
            train_type: TrainType::Express,
            points: vec![PointDto {
                place_id: 1,
                time_to_arrive: Utc::now(),
            }],
        };
        let err = dto.validate().unwrap_err();
        assert_eq!(err.to_string(), "points: Schedule must have at least 2 points");
    }

    #[test]
    fn partial_schedule_update_without_points_is_fine() {
        let dto = UpdateScheduleDto {
            train_type: Some(TrainType::Freight),
            points: None,
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn blank_place_name_is_rejected() {
        let dto = CreatePlaceDto { name: "   ".into() };
        assert!(dto.validate().is_err());
    }
}
