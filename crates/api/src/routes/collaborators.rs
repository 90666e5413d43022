//! Collaborators linked to the signed-in student's business
//!
//! A collaborator is either an intern (a user with a student record) or an
//! external person identified by a personal id. Collaborator accounts have no
//! password.

use axum::{
    extract::{Query, State},
    response::Html,
    Extension, Form,
};
use mercado_shared::{limits, Business, NewStudent, NewUser, StoreError, UserId};
use serde::Deserialize;
use uuid::Uuid;

use super::{current_business, fragments};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CollaboratorForm {
    pub collaborator_id: String,
    #[serde(rename = "isIntern")]
    pub is_intern: String,
    pub middle_names: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub email: String,
    pub personal_id: String,
    pub student_id: String,
    pub grade: String,
    pub class_group: String,
}

impl CollaboratorForm {
    fn intern(&self) -> bool {
        self.is_intern.trim() == "true"
    }

    fn require_identity(&self) -> ApiResult<()> {
        let required = [
            self.middle_names.trim(),
            self.paternal_surname.trim(),
            self.email.trim(),
        ];
        if required.iter().any(|value| value.is_empty()) {
            return Err(ApiError::bad_request("All fields are required"));
        }
        self.check_lengths()
    }

    fn check_lengths(&self) -> ApiResult<()> {
        let fields = [
            (self.middle_names.trim(), limits::TEXT),
            (self.paternal_surname.trim(), limits::TEXT),
            (self.maternal_surname.trim(), limits::TEXT),
            (self.email.trim(), limits::TEXT),
            (self.personal_id.trim(), limits::PERSONAL_ID),
            (self.student_id.trim(), limits::STUDENT_ID),
            (self.grade.trim(), limits::GRADE),
            (self.class_group.trim(), limits::CLASS_GROUP),
        ];
        if fields
            .iter()
            .any(|(value, max)| limits::exceeds(value, *max))
        {
            return Err(ApiError::bad_request("One or more fields are too long"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CollaboratorIdQuery {
    pub collaborator_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormTypeQuery {
    #[serde(rename = "type")]
    pub kind: String,
}

fn parse_collaborator_id(raw: &str) -> ApiResult<UserId> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid collaborator id"))
}

async fn ensure_linked(state: &AppState, business: &Business, user_id: UserId) -> ApiResult<()> {
    let linked = state
        .bounded(state.store.collaborators().is_linked(business.id, user_id))
        .await?;
    if !linked {
        return Err(ApiError::not_found("Collaborator not found"));
    }
    Ok(())
}

async fn render_list(state: &AppState, business: &Business) -> ApiResult<Html<String>> {
    let collaborators = state
        .bounded(state.store.collaborators().list_collaborators(business.id))
        .await?;
    Ok(fragments::collaborators_list(&collaborators))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Html<String>> {
    let business = current_business(&state, &auth_user).await?;
    render_list(&state, &business).await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(form): Form<CollaboratorForm>,
) -> ApiResult<Html<String>> {
    let business = current_business(&state, &auth_user).await?;
    form.require_identity()?;

    let (personal_id, student) = if form.intern() {
        if form.student_id.trim().is_empty() {
            return Err(ApiError::bad_request("Student ID is required for interns"));
        }
        let student = NewStudent {
            id: form.student_id.trim().to_string(),
            grade: form.grade.trim().to_string(),
            class_group: form.class_group.trim().to_string(),
        };
        (None, Some(student))
    } else {
        if form.personal_id.trim().is_empty() {
            return Err(ApiError::bad_request("Personal ID is required"));
        }
        (Some(form.personal_id.trim().to_string()), None)
    };

    let new_user = NewUser {
        email: form.email.trim().to_string(),
        given_names: form.middle_names.trim().to_string(),
        paternal_surname: form.paternal_surname.trim().to_string(),
        maternal_surname: form.maternal_surname.trim().to_string(),
        personal_id,
        password_hash: None,
        student,
    };

    let user = match state
        .bounded(
            state
                .store
                .collaborators()
                .create_and_link(business.id, new_user),
        )
        .await
    {
        Ok(user) => user,
        Err(StoreError::AlreadyExists) => {
            return Err(ApiError::conflict("Collaborator already exists"));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        business_id = %business.id,
        collaborator_id = %user.id,
        intern = form.intern(),
        "collaborator added"
    );

    render_list(&state, &business).await
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(form): Form<CollaboratorForm>,
) -> ApiResult<Html<String>> {
    let collaborator_id = parse_collaborator_id(&form.collaborator_id)?;
    form.require_identity()?;
    let business = current_business(&state, &auth_user).await?;
    ensure_linked(&state, &business, collaborator_id).await?;

    let mut user = state
        .bounded(state.store.users().get(&collaborator_id))
        .await?;
    user.given_names = form.middle_names.trim().to_string();
    user.paternal_surname = form.paternal_surname.trim().to_string();
    user.maternal_surname = form.maternal_surname.trim().to_string();
    user.email = form.email.trim().to_string();

    let student = if form.intern() {
        match state
            .bounded(state.store.students().find_by_user(collaborator_id))
            .await
        {
            Ok(mut student) => {
                student.grade = form.grade.trim().to_string();
                student.class_group = form.class_group.trim().to_string();
                Some(student)
            }
            // External collaborator submitted with the intern fields; only
            // the shared fields apply
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(err.into()),
        }
    } else {
        let personal_id = form.personal_id.trim();
        user.personal_id = (!personal_id.is_empty()).then(|| personal_id.to_string());
        None
    };

    match state
        .bounded(
            state
                .store
                .collaborators()
                .update_collaborator(&user, student.as_ref()),
        )
        .await
    {
        Ok(()) => {}
        Err(StoreError::AlreadyExists) => {
            return Err(ApiError::conflict("Email already in use"));
        }
        Err(err) => return Err(err.into()),
    }
    tracing::info!(collaborator_id = %collaborator_id, "collaborator updated");

    render_list(&state, &business).await
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<CollaboratorIdQuery>,
) -> ApiResult<Html<String>> {
    let collaborator_id = parse_collaborator_id(&query.collaborator_id)?;
    let business = current_business(&state, &auth_user).await?;
    ensure_linked(&state, &business, collaborator_id).await?;

    state
        .bounded(
            state
                .store
                .collaborators()
                .unlink(business.id, collaborator_id),
        )
        .await?;
    tracing::info!(collaborator_id = %collaborator_id, "collaborator removed");

    render_list(&state, &business).await
}

/// Extra inputs for the chosen collaborator type
pub async fn form_fields(Query(query): Query<FormTypeQuery>) -> ApiResult<Html<String>> {
    match query.kind.as_str() {
        "intern" => Ok(fragments::intern_fields()),
        "external" => Ok(fragments::external_fields()),
        _ => Err(ApiError::bad_request("Invalid type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external() -> CollaboratorForm {
        CollaboratorForm {
            is_intern: "false".to_string(),
            middle_names: "Luis".to_string(),
            paternal_surname: "Mora".to_string(),
            email: "luis@example.com".to_string(),
            personal_id: "CURP01".to_string(),
            ..CollaboratorForm::default()
        }
    }

    #[test]
    fn test_identity_required() {
        let mut form = external();
        form.email = "  ".to_string();
        assert!(matches!(
            form.require_identity(),
            Err(ApiError::BadRequest(msg)) if msg == "All fields are required"
        ));
    }

    #[test]
    fn test_overlong_fields_are_bad_requests() {
        assert!(external().require_identity().is_ok());

        let mut form = external();
        form.personal_id = "X".repeat(65);
        assert!(matches!(
            form.require_identity(),
            Err(ApiError::BadRequest(msg)) if msg == "One or more fields are too long"
        ));

        let mut form = external();
        form.is_intern = "true".to_string();
        form.student_id = "A".repeat(33);
        assert!(matches!(form.require_identity(), Err(ApiError::BadRequest(_))));

        let mut form = external();
        form.email = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(form.require_identity(), Err(ApiError::BadRequest(_))));
    }
}
