//! Project listing, detail and explanation handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use folio_core::profile::Project;
use folio_core::ChatMode;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectSummary {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub demo_url: String,
    pub github_url: String,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            slug: project.effective_slug(),
            description: project.description.clone(),
            tech_stack: project.tech_stack.clone(),
            demo_url: project.demo_url.clone(),
            github_url: project.github_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub count: usize,
    pub projects: Vec<ProjectSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectDetailResponse {
    /// Full project record
    #[schema(value_type = Object)]
    pub project: Project,
    pub explain_endpoint: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectExplanation {
    pub project_name: String,
    pub explanation: String,
    pub tech_stack: Vec<String>,
    pub github_url: String,
    pub demo_url: String,
}

fn find_project<'a>(state: &'a AppState, slug: &str) -> Result<&'a Project, AppError> {
    state
        .portfolio()
        .find_project(slug)
        .ok_or_else(|| AppError::NotFound(format!("Project '{slug}'")))
}

/// List all projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    responses(
        (status = 200, description = "All projects in record order", body = ProjectListResponse)
    )
)]
pub async fn list_projects(State(state): State<Arc<AppState>>) -> Json<ProjectListResponse> {
    let projects: Vec<ProjectSummary> = state
        .portfolio()
        .projects
        .iter()
        .map(ProjectSummary::from)
        .collect();

    Json(ProjectListResponse {
        count: projects.len(),
        projects,
    })
}

/// Get one project by slug
#[utoipa::path(
    get,
    path = "/api/v1/projects/{slug}",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug, or its name lowercased with dashes")),
    responses(
        (status = 200, description = "Project found", body = ProjectDetailResponse),
        (status = 404, description = "Unknown project", body = crate::error::ApiError)
    )
)]
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectDetailResponse>, AppError> {
    let project = find_project(&state, &slug)?;
    Ok(Json(ProjectDetailResponse {
        project: project.clone(),
        explain_endpoint: format!("/api/v1/projects/{}/explain", project.effective_slug()),
    }))
}

/// Explain a project in technical mode, using its repository when one is known
#[utoipa::path(
    get,
    path = "/api/v1/projects/{slug}/explain",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug, or its name lowercased with dashes")),
    responses(
        (status = 200, description = "Generated explanation", body = ProjectExplanation),
        (status = 404, description = "Unknown project", body = crate::error::ApiError)
    )
)]
pub async fn explain_project(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectExplanation>, AppError> {
    state.increment_requests();
    let project = find_project(&state, &slug)?;

    let query = format!(
        "Explain the {} project in detail: architecture, tech stack, challenges, \
         and what makes it impressive.",
        project.name
    );
    let reply = state
        .chat()
        .answer_unfiltered(&query, ChatMode::Technical)
        .await;

    Ok(Json(ProjectExplanation {
        project_name: project.name.clone(),
        explanation: reply.response,
        tech_stack: project.tech_stack.clone(),
        github_url: project.github_url.clone(),
        demo_url: project.demo_url.clone(),
    }))
}
