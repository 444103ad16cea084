//! Migrations compiled into the binary
//!
//! New scripts go in `api/migrations/` and get appended here with the next version.

use crate::domain::entities::Migration;

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "create_papers",
        include_str!("../migrations/0001_create_papers.sql"),
    ),
    Migration::new(
        2,
        "create_authors",
        include_str!("../migrations/0002_create_authors.sql"),
    ),
    Migration::new(
        3,
        "add_paper_venue",
        include_str!("../migrations/0003_add_paper_venue.sql"),
    ),
];
