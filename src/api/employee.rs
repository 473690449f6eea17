use crate::{
    feed::{ChangeAction, ChangeFeed},
    model::employee::{Employee, MonthlyJoining, monthly_joining_counts},
    storage::PhotoStore,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpRequest, HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Columns a directory edit may touch.
const EMPLOYEE_COLUMNS: &[&str] = &[
    "full_name",
    "email",
    "department",
    "role",
    "phone",
    "profile_picture",
    "joining_date",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Jane Doe", value_type = String)]
    pub full_name: String,
    #[schema(example = "jane@company.com", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "Engineering", value_type = String)]
    pub department: String,
    #[schema(example = "Backend Developer", value_type = String)]
    pub role: String,
    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,
    #[schema(nullable = true)]
    pub profile_picture: Option<String>,
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>, nullable = true)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct JoiningAnalyticsResponse {
    pub months: Vec<MonthlyJoining>,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Internal Server Error"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    payload: web::Json<CreateEmployee>,
) -> impl Responder {
    let result = sqlx::query_as::<_, Employee>(
        r#"
        INSERT INTO employees
        (full_name, email, department, role, phone, profile_picture, joining_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&payload.full_name)
    .bind(&payload.email)
    .bind(&payload.department)
    .bind(&payload.role)
    .bind(&payload.phone)
    .bind(&payload.profile_picture)
    .bind(payload.joining_date)
    .fetch_one(pool.get_ref())
    .await;

    match result {
        Ok(employee) => {
            feed.publish("employees", ChangeAction::Insert);
            HttpResponse::Created().json(employee)
        }
        Err(e) => {
            error!(error = %e, "Failed to create employee");
            HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }))
        }
    }
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("department", Query, description = "Filter by department"),
        ("role", Query, description = "Filter by role"),
        ("search", Query, description = "Search across name, email, department and role")
    ),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    pool: web::Data<PgPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions: Vec<String> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = &query.department {
        bindings.push(department.clone());
        conditions.push(format!("department = ${}", bindings.len()));
    }

    if let Some(role) = &query.role {
        bindings.push(role.clone());
        conditions.push(format!("role = ${}", bindings.len()));
    }

    if let Some(search) = &query.search {
        let like = format!("%{}%", search);
        let first = bindings.len() + 1;
        bindings.extend([like.clone(), like.clone(), like.clone(), like]);
        conditions.push(format!(
            "(full_name ILIKE ${} OR email ILIKE ${} OR department ILIKE ${} OR role ILIKE ${})",
            first,
            first + 1,
            first + 2,
            first + 3
        ));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count employees");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
        where_clause,
        bindings.len() + 1,
        bindings.len() + 2
    );
    debug!(sql = %data_sql, bindings = ?bindings, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch employees");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully"),
        (status = 400, description = "Unknown or missing fields"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, EMPLOYEE_COLUMNS, "id", employee_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().body("Employee not found"));
    }

    feed.publish("employees", ChangeAction::Update);
    Ok(HttpResponse::Ok().body("Employee updated successfully"))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let result = sqlx::query(r#"DELETE FROM employees WHERE id = $1"#)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            if res.rows_affected() == 0 {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Employee not found"
                })));
            }

            feed.publish("employees", ChangeAction::Delete);
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }

        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");

            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let employee =
        sqlx::query_as::<_, Employee>(r#"SELECT * FROM employees WHERE id = $1"#)
            .bind(employee_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, employee_id, "Failed to fetch employee");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Employee not found"
        }))),
    }
}

/// Monthly joining analytics
#[utoipa::path(
    get,
    path = "/api/v1/employees/analytics/joining",
    responses(
        (status = 200, description = "Joining head-count for the trailing 12 months", body = JoiningAnalyticsResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn joining_analytics(pool: web::Data<PgPool>) -> actix_web::Result<impl Responder> {
    let joining_dates = sqlx::query_scalar::<_, NaiveDate>(
        r#"SELECT joining_date FROM employees WHERE joining_date IS NOT NULL"#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch joining dates");
        ErrorInternalServerError("Database error")
    })?;

    let months = monthly_joining_counts(&joining_dates, Utc::now().date_naive());
    Ok(HttpResponse::Ok().json(JoiningAnalyticsResponse { months }))
}

/// Upload profile photo
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}/photo",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content = Vec<u8>, description = "Raw image bytes; Content-Type selects the format", content_type = "image/png"),
    responses(
        (status = 200, description = "Photo stored", body = Object, example = json!({
            "url": "http://localhost:8080/media/profile-photos/1.png"
        })),
        (status = 400, description = "Empty body"),
        (status = 404, description = "Employee not found"),
        (status = 415, description = "Unsupported image type"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_photo(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    feed: web::Data<ChangeFeed>,
    store: web::Data<PhotoStore>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    if body.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Empty request body"
        })));
    }

    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if PhotoStore::extension_for(content_type).is_none() {
        return Ok(HttpResponse::UnsupportedMediaType().json(json!({
            "message": "Unsupported image type"
        })));
    }

    let exists = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(SELECT 1 FROM employees WHERE id = $1)"#,
    )
    .bind(employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Employee lookup failed");
        ErrorInternalServerError("Database error")
    })?;

    if !exists {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        })));
    }

    let url = store
        .save(employee_id, content_type, &body)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to store photo");
            ErrorInternalServerError("Failed to store photo")
        })?;

    // Second, independent write: a failure here leaves the photo on disk
    // and the employee row without it, matching the original flow.
    sqlx::query(
        r#"UPDATE employees SET profile_picture = $1, updated_at = NOW() WHERE id = $2"#,
    )
    .bind(&url)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to link photo to employee");
        ErrorInternalServerError("Failed to store photo")
    })?;

    feed.publish("employees", ChangeAction::Update);
    Ok(HttpResponse::Ok().json(json!({ "url": url })))
}
