//! HTTP handlers.

mod events;
mod projects;

pub use events::project_events;
pub use projects::{
    create_project, get_project, get_project_files, get_project_status, health_check,
    list_projects, stop_project,
};
