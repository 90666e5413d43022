//! Profile summary and business profile

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    Extension, Form,
};
use mercado_shared::{limits, NewBusiness, StoreError};
use serde::Deserialize;

use super::{current_student, fragments};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Name and photo of the signed-in student
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Html<String>> {
    let student = current_student(&state, &auth_user).await?;
    let user = state
        .bounded(state.store.users().get(&auth_user.user_id))
        .await?;
    Ok(fragments::profile_summary(&user, &student))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BusinessForm {
    pub business_name: String,
    pub business_type: String,
    pub description: String,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Create the student's business, or update it when one exists.
pub async fn save_business(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(form): Form<BusinessForm>,
) -> ApiResult<impl IntoResponse> {
    let name = form.business_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Business name is required"));
    }
    if limits::exceeds(name, limits::TEXT)
        || limits::exceeds(form.business_type.trim(), limits::TEXT)
    {
        return Err(ApiError::bad_request(
            "Business name and type must be at most 255 characters",
        ));
    }

    let student = current_student(&state, &auth_user).await?;
    let businesses = state.store.businesses();

    match state.bounded(businesses.find_by_owner(&student.id)).await {
        Ok(mut business) => {
            business.name = name.to_string();
            business.kind = optional(&form.business_type);
            business.description = optional(&form.description);
            state.bounded(businesses.update(&business)).await?;
            tracing::info!(business_id = %business.id, "business profile updated");
        }
        Err(StoreError::NotFound) => {
            let business = state
                .bounded(businesses.create(NewBusiness {
                    owner_student_id: student.id.clone(),
                    name: name.to_string(),
                    kind: optional(&form.business_type),
                    description: optional(&form.description),
                }))
                .await?;
            tracing::info!(business_id = %business.id, "business profile created");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(fragments::notice("Business profile saved"))
}
