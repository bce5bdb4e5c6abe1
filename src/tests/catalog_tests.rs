use crate::catalog::*;
use crate::Error;

#[test]
fn test_builtin_catalog() {
    let catalog = StaticCatalog::builtin();
    let courses = catalog.courses();

    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0].id, 1);
    assert_eq!(courses[0].title, "Matematică 1");
    assert_eq!(courses[1].title, "Fizică");
    assert!(courses.iter().all(|c| c.documents.len() == 2));
}

#[test]
fn test_documents_for_course() {
    let catalog = StaticCatalog::builtin();

    let docs = catalog.documents_for(2);
    assert_eq!(docs[1].id, 2);
    assert_eq!(docs[1].locator, "assets/docs/physics-course2.pdf");
}

#[test]
fn test_documents_for_unknown_course() {
    let catalog = StaticCatalog::builtin();
    assert!(catalog.documents_for(3).is_empty());
}

#[test]
fn test_catalog_from_json() {
    let json = r#"[
        {
            "id": 7,
            "title": "Chimie",
            "documents": [{ "id": 1, "name": "Intro", "locator": "docs/chem1.pdf" }]
        }
    ]"#;

    let catalog = StaticCatalog::from_json(json).expect("Failed to parse catalog");
    let courses = catalog.courses();

    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].description, "");
    assert_eq!(catalog.documents_for(7)[0].name, "Intro");
}

#[test]
fn test_catalog_from_invalid_json() {
    let result = StaticCatalog::from_json("{ not a list }");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_empty_catalog() {
    let catalog = StaticCatalog::default();
    assert!(catalog.courses().is_empty());
    assert!(catalog.documents_for(1).is_empty());
}
