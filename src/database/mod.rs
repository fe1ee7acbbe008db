//! SQLite-backed persistence: schema bootstrap and repositories.

pub mod project_repository;
pub mod schema;
pub mod stats_repository;
pub mod subresource_repository;

pub use project_repository::ProjectRepository;
pub use stats_repository::StatsRepository;
pub use subresource_repository::SubresourceRepository;
