pub mod catalog_repository;
pub mod config;
pub mod database;
pub mod job_repository;
pub mod product_repository;
pub mod site_repository;
pub mod violation_repository;

pub use catalog_repository::CatalogRepository;
pub use config::DatabaseConfig;
pub use database::Database;
pub use job_repository::JobRepository;
pub use product_repository::ScrapedProductRepository;
pub use site_repository::SiteRepository;
pub use violation_repository::ViolationRepository;
