use crate::api::attendance::ClockInReq;
use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, EmployeeQuery, JoiningAnalyticsResponse,
};
use crate::model::attendance::{AttendanceLog, PauseKind, PauseResumeEvent};
use crate::model::employee::{Employee, MonthlyJoining};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Directory & Attendance API",
        version = "1.0.0",
        description = r#"
## HR Directory & Attendance Service

This API powers a small HR application: an **employee directory** plus a
personal **clock-in/clock-out attendance tracker**.

### 🔹 Key Features
- **Employee Directory**
  - Create, update, list, search and delete employee profiles
  - Profile photo upload with public serving
  - Monthly joining analytics
- **Attendance Tracking**
  - Clock-in / clock-out with optional geolocation capture
  - Pause/resume with net worked-duration accounting
  - Per-session map view of the clock-in location
- **Overdue Clock-out Handling**
  - Scheduled sweep stamping single-use clock-out tokens
  - Emailed one-click clock-out links

### 🔐 Security
API endpoints are protected using **JWT Bearer authentication**; the emailed
clock-out link authenticates through its single-use token instead.

### 📦 Response Format
- JSON-based RESTful responses
- Server-sent events on `/events` for change notifications

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::joining_analytics,
        crate::api::employee::upload_photo,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::pause_work,
        crate::api::attendance::resume_work,
        crate::api::attendance::today_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::map_view,

        crate::jobs::overdue::trigger_sweep
    ),
    components(
        schemas(
            CreateEmployee,
            EmployeeQuery,
            Employee,
            EmployeeListResponse,
            MonthlyJoining,
            JoiningAnalyticsResponse,
            ClockInReq,
            AttendanceLog,
            PauseResumeEvent,
            PauseKind
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Attendance", description = "Attendance tracking APIs"),
        (name = "Jobs", description = "Scheduled job triggers"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
