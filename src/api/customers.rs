use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::info;

use super::ApiState;
use super::error::{ApiError, ResultExt, is_unique_violation};
use crate::auth::Authenticated;
use crate::db::{CustomerSummary, DEFAULT_ROLE, Gender, NewCustomer};
use crate::password::hash_password;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route("/{id}", get(get_customer).delete(delete_customer))
        .route("/update/{id}", put(update_customer))
        .with_state(state)
}

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAX_AGE: i64 = 150;

#[derive(Deserialize)]
pub(super) struct RegistrationRequest {
    name: String,
    email: String,
    password: String,
    age: i64,
    gender: String,
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request("Name is too long"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

fn validate_age(age: i64) -> Result<(), ApiError> {
    if !(1..=MAX_AGE).contains(&age) {
        return Err(ApiError::bad_request("Age must be between 1 and 150"));
    }
    Ok(())
}

fn parse_gender(gender: &str) -> Result<Gender, ApiError> {
    gender
        .parse()
        .map_err(|_| ApiError::bad_request("Gender must be MALE or FEMALE"))
}

/// Create a customer and answer with a fresh token in the `Authorization`
/// header. Shared by `/customers` and `/auth/signup`.
pub(super) async fn register(
    state: &ApiState,
    payload: RegistrationRequest,
) -> Result<(StatusCode, [(HeaderName, HeaderValue); 1]), ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    validate_name(name)?;
    validate_email(email)?;
    validate_age(payload.age)?;
    let gender = parse_gender(&payload.gender)?;

    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }

    let taken = state
        .db
        .customers()
        .exists_by_email(email)
        .await
        .db_err("Failed to check email availability")?;
    if taken {
        return Err(ApiError::conflict("Customer with email already exists"));
    }

    let password_hash =
        hash_password(&payload.password).internal_err("Failed to hash password")?;

    let created = state
        .db
        .customers()
        .create(&NewCustomer {
            name,
            email,
            password_hash: &password_hash,
            age: payload.age,
            gender,
        })
        .await;

    match created {
        Ok(_) => {}
        // Lost a race with a concurrent registration
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Customer with email already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create customer", e)),
    }

    let token = state
        .issuer
        .issue(email, &[DEFAULT_ROLE.to_string()])
        .internal_err("Failed to issue token")?;
    let header_value = HeaderValue::from_str(&token).internal_err("Failed to issue token")?;

    Ok((StatusCode::OK, [(header::AUTHORIZATION, header_value)]))
}

async fn register_customer(
    State(state): State<ApiState>,
    Json(payload): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    register(&state, payload).await
}

async fn list_customers(
    State(state): State<ApiState>,
) -> Result<Json<Vec<CustomerSummary>>, ApiError> {
    let customers = state
        .db
        .customers()
        .list()
        .await
        .db_err("Failed to list customers")?;

    Ok(Json(customers.iter().map(CustomerSummary::from).collect()))
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Customer with id [{}] does not exist", id))
}

async fn get_customer(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<CustomerSummary>, ApiError> {
    let customer = state
        .db
        .customers()
        .get_by_id(id)
        .await
        .db_err("Failed to get customer")?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(CustomerSummary::from(&customer)))
}

#[derive(Deserialize)]
struct UpdateCustomerRequest {
    name: Option<String>,
    email: Option<String>,
    age: Option<i64>,
}

async fn update_customer(
    State(state): State<ApiState>,
    Authenticated(identity): Authenticated,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut customer = state
        .db
        .customers()
        .get_by_id(id)
        .await
        .db_err("Failed to get customer")?
        .ok_or_else(|| not_found(id))?;

    let mut changed = false;

    let name = payload.name.as_deref().map(str::trim);
    if let Some(name) = name.filter(|n| *n != customer.name) {
        validate_name(name)?;
        customer.name = name.to_string();
        changed = true;
    }

    let email = payload.email.as_deref().map(str::trim);
    if let Some(email) = email.filter(|e| *e != customer.email) {
        validate_email(email)?;
        let taken = state
            .db
            .customers()
            .exists_by_email(email)
            .await
            .db_err("Failed to check email availability")?;
        if taken {
            return Err(ApiError::conflict("Email is already taken"));
        }
        customer.email = email.to_string();
        changed = true;
    }

    if let Some(age) = payload.age.filter(|a| *a != customer.age) {
        validate_age(age)?;
        customer.age = age;
        changed = true;
    }

    if !changed {
        return Err(ApiError::bad_request("No data change found"));
    }

    match state.db.customers().update(&customer).await {
        Ok(true) => {
            info!(customer_id = id, by = %identity.subject, "Customer updated");
            Ok(StatusCode::OK)
        }
        // Deleted between the read and the write
        Ok(false) => Err(not_found(id)),
        Err(e) if is_unique_violation(&e) => Err(ApiError::conflict("Email is already taken")),
        Err(e) => Err(ApiError::db_error("Failed to update customer", e)),
    }
}

async fn delete_customer(
    State(state): State<ApiState>,
    Authenticated(identity): Authenticated,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .customers()
        .delete(id)
        .await
        .db_err("Failed to delete customer")?;

    if !deleted {
        return Err(not_found(id));
    }

    info!(customer_id = id, by = %identity.subject, "Customer deleted");
    Ok(StatusCode::OK)
}
