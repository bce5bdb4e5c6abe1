//! Course catalog
//!
//! Read-only course and document metadata. The chat core only reads ids from
//! here to populate context choices.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A document attached to a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, sent as `pdf_id`
    pub id: u64,
    /// Display name
    pub name: String,
    /// Where the document lives (path or URL)
    pub locator: String,
}

/// A course and its documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course id, sent as `course_id`
    pub id: u64,
    /// Course title
    pub title: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Documents in display order
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Source of course metadata
pub trait CatalogProvider: Send + Sync {
    /// All known courses
    fn courses(&self) -> Vec<Course>;

    /// Documents of one course; empty if the course is unknown
    fn documents_for(&self, course_id: u64) -> Vec<Document> {
        self.courses()
            .into_iter()
            .find(|c| c.id == course_id)
            .map(|c| c.documents)
            .unwrap_or_default()
    }
}

/// Catalog backed by a fixed list of courses
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    courses: Vec<Course>,
}

impl StaticCatalog {
    /// Create a catalog from a list of courses
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    /// Parse a JSON array of courses
    pub fn from_json(json: &str) -> Result<Self> {
        let courses: Vec<Course> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse catalog: {}", e)))?;
        Ok(Self::new(courses))
    }

    /// The courses bundled with the client
    pub fn builtin() -> Self {
        let doc = |id: u64, name: &str, locator: &str| Document {
            id,
            name: name.to_string(),
            locator: locator.to_string(),
        };

        Self::new(vec![
            Course {
                id: 1,
                title: "Matematică 1".to_string(),
                description: "Curs de matematică pentru inginerie".to_string(),
                documents: vec![
                    doc(1, "Cursul 1", "assets/docs/math-course1.pdf"),
                    doc(2, "Cursul 2", "assets/docs/math-course2.pdf"),
                ],
            },
            Course {
                id: 2,
                title: "Fizică".to_string(),
                description: "Curs de fizică generală".to_string(),
                documents: vec![
                    doc(1, "Cursul 1", "assets/docs/physics-course1.pdf"),
                    doc(2, "Cursul 2", "assets/docs/physics-course2.pdf"),
                ],
            },
        ])
    }
}

impl CatalogProvider for StaticCatalog {
    fn courses(&self) -> Vec<Course> {
        self.courses.clone()
    }
}
